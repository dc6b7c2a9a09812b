//! One generation of log outputs.
//!
//! An `AppenderSet` bundles the console appender and the file appender
//! (optionally behind the async queue). The registry builds a new set on every
//! reset and stops the previous one only after the new set is live.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Level;

use crate::config::schema::{ConsoleTarget, LoggingConfig};
use crate::logging::async_writer::AsyncAppender;
use crate::logging::parse_file_size;
use crate::logging::rolling::{RollingFile, RollingPolicy};

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Writes encoded records to stdout or stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleAppender {
    target: ConsoleTarget,
}

impl ConsoleAppender {
    pub fn new(target: ConsoleTarget) -> Self {
        Self { target }
    }

    fn write(&self, record: &[u8]) -> io::Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().lock().write_all(record),
            ConsoleTarget::Stderr => io::stderr().lock().write_all(record),
        }
    }
}

enum FileSink {
    Direct(Arc<RollingFile>),
    Async {
        file: Arc<RollingFile>,
        queue: AsyncAppender,
    },
}

/// Console + rolling file (+ async queue), swapped as a unit.
pub struct AppenderSet {
    generation: u64,
    console: ConsoleAppender,
    file: FileSink,
    stopped: AtomicBool,
}

impl AppenderSet {
    /// Open the outputs described by `config`.
    pub fn build(config: &LoggingConfig, generation: u64) -> io::Result<Self> {
        let policy = RollingPolicy {
            max_size: parse_file_size(&config.file.max_size).unwrap_or(DEFAULT_MAX_FILE_SIZE),
            max_history: config.file.max_history,
            rotation: config.file.rotation,
        };
        let file = Arc::new(RollingFile::open(
            &config.file.path,
            policy,
            config.file.immediate_flush,
        )?);

        let file = if config.async_appender.enabled {
            let queue = AsyncAppender::spawn(
                Arc::clone(&file),
                config.async_appender.queue_size,
                config.async_appender.discard_threshold,
            )?;
            FileSink::Async { file, queue }
        } else {
            FileSink::Direct(file)
        };

        Ok(Self {
            generation,
            console: ConsoleAppender::new(config.console.target),
            file,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_async(&self) -> bool {
        matches!(self.file, FileSink::Async { .. })
    }

    /// Path of the active log file.
    pub fn file_path(&self) -> &std::path::Path {
        match &self.file {
            FileSink::Direct(file) | FileSink::Async { file, .. } => file.path(),
        }
    }

    /// Write one record to the console. Records reaching a stopped set are dropped.
    pub fn write_console(&self, record: &[u8]) -> io::Result<()> {
        if self.is_stopped() {
            return Ok(());
        }
        self.console.write(record)
    }

    /// Write one record to the file, through the async queue when enabled.
    pub fn write_file(&self, level: Level, record: &[u8]) -> io::Result<()> {
        if self.is_stopped() {
            return Ok(());
        }
        match &self.file {
            FileSink::Direct(file) => file.write_record(record),
            FileSink::Async { queue, .. } => {
                queue.append(level, record);
                Ok(())
            }
        }
    }

    /// Records shed by the async queue.
    pub fn dropped_events(&self) -> u64 {
        match &self.file {
            FileSink::Direct(_) => 0,
            FileSink::Async { queue, .. } => queue.dropped(),
        }
    }

    /// Drain pending records, flush and close the file. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let result = match &self.file {
            FileSink::Direct(file) => file.close(),
            FileSink::Async { file, queue } => {
                queue.stop();
                file.close()
            }
        };
        if let Err(e) = result {
            eprintln!("plughost: failed to flush appender generation {}: {e}", self.generation);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AppenderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppenderSet")
            .field("generation", &self.generation)
            .field("file", &self.file_path())
            .field("async", &self.is_async())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
