//! Size-and-time rolling file appender.
//!
//! # Responsibilities
//! - Append encoded log records to the active file
//! - Roll over when the time period changes or the size limit would be exceeded
//! - Keep a bounded number of archives, deleting the oldest
//!
//! # Naming
//! ```text
//! active:   logs/plughost.log
//! archives: logs/plughost.2026-10-17.0.log, logs/plughost.2026-10-17.1.log, ...
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::config::schema::FileRotation;

/// Rollover thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingPolicy {
    /// Maximum bytes in one file.
    pub max_size: u64,
    /// Archives to keep.
    pub max_history: usize,
    /// Time boundary.
    pub rotation: FileRotation,
}

impl FileRotation {
    fn period_key(self, now: &DateTime<Local>) -> String {
        let format = match self {
            FileRotation::Daily => "%Y-%m-%d",
            FileRotation::Hourly => "%Y-%m-%d-%H",
            FileRotation::Minutely => "%Y-%m-%d-%H-%M",
        };
        now.format(format).to_string()
    }
}

struct ActiveFile {
    writer: Option<BufWriter<File>>,
    size: u64,
    period: String,
    closed: bool,
}

/// A log file that rolls over by size and by time.
pub struct RollingFile {
    path: PathBuf,
    dir: PathBuf,
    stem: String,
    extension: Option<String>,
    policy: RollingPolicy,
    immediate_flush: bool,
    active: Mutex<ActiveFile>,
}

impl RollingFile {
    /// Open (or create) the active file, creating parent directories.
    pub fn open(path: &Path, policy: RollingPolicy, immediate_flush: bool) -> io::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file name is not valid UTF-8"))?
            .to_string();
        let extension = path.extension().and_then(|s| s.to_str()).map(str::to_string);

        let file = open_append(path)?;
        let metadata = file.metadata()?;
        let size = metadata.len();
        // A non-empty file belongs to the period it was last written in, so a
        // restart after a boundary archives it under that period.
        let opened_at = match metadata.modified() {
            Ok(modified) if size > 0 => DateTime::<Local>::from(modified),
            _ => Local::now(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            stem,
            extension,
            policy,
            immediate_flush,
            active: Mutex::new(ActiveFile {
                writer: Some(BufWriter::new(file)),
                size,
                period: policy.rotation.period_key(&opened_at),
                closed: false,
            }),
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one encoded record.
    pub fn write_record(&self, record: &[u8]) -> io::Result<()> {
        self.write_record_at(record, &Local::now())
    }

    pub(crate) fn write_record_at(&self, record: &[u8], now: &DateTime<Local>) -> io::Result<()> {
        let mut active = self.active.lock();
        if active.closed {
            return Ok(());
        }
        let period = self.policy.rotation.period_key(now);
        let len = record.len() as u64;

        let period_changed = period != active.period;
        let size_exceeded = active.size > 0 && active.size + len > self.policy.max_size;
        if period_changed || size_exceeded {
            self.roll(&mut active, period)?;
        }

        if active.writer.is_none() {
            active.writer = Some(BufWriter::new(open_append(&self.path)?));
        }
        if let Some(writer) = active.writer.as_mut() {
            writer.write_all(record)?;
            if self.immediate_flush {
                writer.flush()?;
            }
        }
        active.size += len;
        Ok(())
    }

    /// Flush buffered bytes to disk.
    pub fn flush(&self) -> io::Result<()> {
        match self.active.lock().writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// Flush and refuse further records.
    ///
    /// A newer generation may already be appending to the same path; a closed
    /// file never rolls it away.
    pub fn close(&self) -> io::Result<()> {
        let mut active = self.active.lock();
        active.closed = true;
        match active.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.active.lock().closed
    }

    /// Archived files, oldest first.
    pub fn archives(&self) -> io::Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = self.archive_key(name) {
                archives.push((key, entry.path()));
            }
        }
        archives.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(archives.into_iter().map(|(_, path)| path).collect())
    }

    fn roll(&self, active: &mut ActiveFile, next_period: String) -> io::Result<()> {
        if let Some(mut writer) = active.writer.take() {
            writer.flush()?;
        }

        if active.size > 0 {
            let archive = self.next_archive_path(&active.period)?;
            fs::rename(&self.path, &archive)?;
        }

        active.writer = Some(BufWriter::new(open_append(&self.path)?));
        active.size = 0;
        active.period = next_period;
        self.prune()
    }

    fn next_archive_path(&self, period: &str) -> io::Result<PathBuf> {
        // Indices keep growing within a period even after pruning, so a new
        // archive never sorts before an older one.
        let index = self
            .archives()?
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .filter_map(|name| self.archive_key(name))
            .filter(|(p, _)| p == period)
            .map(|(_, index)| index + 1)
            .max()
            .unwrap_or(0);
        let name = match &self.extension {
            Some(ext) => format!("{}.{}.{}.{}", self.stem, period, index, ext),
            None => format!("{}.{}.{}", self.stem, period, index),
        };
        Ok(self.dir.join(name))
    }

    fn prune(&self) -> io::Result<()> {
        let archives = self.archives()?;
        if archives.len() > self.policy.max_history {
            let excess = archives.len() - self.policy.max_history;
            for path in &archives[..excess] {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// `(period, index)` of an archive name, `None` for anything else.
    fn archive_key(&self, name: &str) -> Option<(String, usize)> {
        let rest = name.strip_prefix(self.stem.as_str())?.strip_prefix('.')?;
        let middle = match &self.extension {
            Some(ext) => rest.strip_suffix(ext.as_str())?.strip_suffix('.')?,
            None => rest,
        };
        let (period, index) = middle.rsplit_once('.')?;
        if period.is_empty() {
            return None;
        }
        Some((period.to_string(), index.parse().ok()?))
    }
}

impl Drop for RollingFile {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
