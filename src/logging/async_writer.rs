//! Async buffering in front of the rolling file.
//!
//! # Responsibilities
//! - Hand encoded records to a background writer thread through a bounded queue
//! - Shed low-priority records once the queue is nearly full
//! - Drain and flush on stop
//!
//! # Design Decisions
//! - Producers never block: a full queue drops the record and counts it
//! - Below `discard_threshold` remaining slots, TRACE/DEBUG/INFO are dropped first

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::Level;

use crate::logging::rolling::RollingFile;
use crate::observability::metrics;

enum Message {
    Record(Vec<u8>),
    Stop,
}

/// Bounded, non-blocking async appender.
pub struct AsyncAppender {
    tx: SyncSender<Message>,
    depth: Arc<AtomicUsize>,
    queue_size: usize,
    discard_threshold: usize,
    stopped: AtomicBool,
    dropped: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncAppender {
    /// Start the writer thread in front of `file`.
    pub fn spawn(file: Arc<RollingFile>, queue_size: usize, discard_threshold: usize) -> io::Result<Self> {
        let queue_size = queue_size.max(1);
        let (tx, rx) = mpsc::sync_channel(queue_size);
        let depth = Arc::new(AtomicUsize::new(0));

        let worker_depth = Arc::clone(&depth);
        let worker = thread::Builder::new()
            .name("plughost-log-writer".to_string())
            .spawn(move || drain(rx, &file, &worker_depth))?;

        Ok(Self {
            tx,
            depth,
            queue_size,
            discard_threshold,
            stopped: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue one record. Never blocks.
    pub fn append(&self, level: Level, record: &[u8]) {
        if self.stopped.load(Ordering::Acquire) {
            self.record_drop();
            return;
        }

        let remaining = self.queue_size.saturating_sub(self.depth.load(Ordering::Acquire));
        if remaining < self.discard_threshold && is_discardable(level) {
            self.record_drop();
            return;
        }

        self.depth.fetch_add(1, Ordering::AcqRel);
        match self.tx.try_send(Message::Record(record.to_vec())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                self.record_drop();
            }
        }
    }

    /// Records currently queued.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Records dropped since start.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain the queue, flush the file and join the writer thread.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // Blocks only the stopping thread, and only until the writer catches up.
        let _ = self.tx.send(Message::Stop);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_log_event_dropped();
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_discardable(level: Level) -> bool {
    matches!(level, Level::TRACE | Level::DEBUG | Level::INFO)
}

fn drain(rx: Receiver<Message>, file: &RollingFile, depth: &AtomicUsize) {
    for message in rx {
        match message {
            Message::Record(record) => {
                depth.fetch_sub(1, Ordering::AcqRel);
                if let Err(e) = file.write_record(&record) {
                    // The logging pipeline cannot report its own failures through itself.
                    eprintln!("plughost: failed to write log record: {e}");
                }
            }
            Message::Stop => break,
        }
    }
    if let Err(e) = file.flush() {
        eprintln!("plughost: failed to flush log file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FileRotation;
    use crate::logging::rolling::RollingPolicy;
    use std::fs;

    fn rolling(dir: &std::path::Path) -> Arc<RollingFile> {
        let policy = RollingPolicy {
            max_size: 1024 * 1024,
            max_history: 1,
            rotation: FileRotation::Daily,
        };
        Arc::new(RollingFile::open(&dir.join("async.log"), policy, false).unwrap())
    }

    #[test]
    fn stop_drains_queued_records() {
        let dir = tempfile::tempdir().unwrap();
        let file = rolling(dir.path());
        let appender = AsyncAppender::spawn(Arc::clone(&file), 64, 0).unwrap();

        for i in 0..10 {
            appender.append(Level::INFO, format!("line {i}\n").as_bytes());
        }
        appender.stop();

        let content = fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert_eq!(appender.dropped(), 0);
    }

    #[test]
    fn appends_after_stop_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let appender = AsyncAppender::spawn(rolling(dir.path()), 8, 0).unwrap();
        appender.stop();
        appender.append(Level::ERROR, b"late\n");
        assert_eq!(appender.dropped(), 1);
    }

    #[test]
    fn threshold_sheds_low_priority_only() {
        let dir = tempfile::tempdir().unwrap();
        let appender = AsyncAppender::spawn(rolling(dir.path()), 8, 8).unwrap();
        // One queued record leaves 7 of 8 slots, below the threshold of 8.
        appender.depth.store(1, Ordering::Release);
        appender.append(Level::INFO, b"info\n");
        appender.append(Level::DEBUG, b"debug\n");
        assert_eq!(appender.dropped(), 2);

        appender.append(Level::WARN, b"warn\n");
        assert_eq!(appender.dropped(), 2);
        appender.stop();
    }
}
