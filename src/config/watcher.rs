//! Configuration file watcher for hot reload.
//!
//! Only the logging section is reloadable. Every other section is read once
//! at boot; changes to it are logged and ignored until restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{HostConfig, LoggingConfig};
use crate::logging::LogRegistry;

/// A watcher that monitors the configuration file for logging changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Arc<Mutex<HostConfig>>,
    update_tx: mpsc::UnboundedSender<LoggingConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher seeded with the configuration in effect.
    ///
    /// Returns the watcher and a receiver for logging configuration updates.
    pub fn new(path: &Path, current: HostConfig) -> (Self, mpsc::UnboundedReceiver<LoggingConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current: Arc::new(Mutex::new(current)),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let current = Arc::clone(&self.current);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        reload(&path, &current, &tx);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, current: &Mutex<HostConfig>, tx: &mpsc::UnboundedSender<LoggingConfig>) {
    let mut new_config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            return;
        }
    };

    let mut current = current.lock();
    if let Some(logging) = logging_update(&current, &mut new_config) {
        tracing::info!("Logging configuration changed, scheduling reset");
        current.logging = logging.clone();
        let _ = tx.send(logging);
    }
}

/// The new logging section if it differs. Other changed sections are reported.
fn logging_update(current: &HostConfig, new_config: &mut HostConfig) -> Option<LoggingConfig> {
    // Process overrides are folded into the running config; keep them.
    new_config.logging.async_appender.enabled |= current.logging.async_appender.enabled;
    new_config.logging.file.immediate_flush |= current.logging.file.immediate_flush;

    let logging_changed = new_config.logging != current.logging;
    let mut rest = new_config.clone();
    rest.logging = current.logging.clone();
    if rest != *current {
        tracing::warn!("Only the logging section is reloaded; other changes apply after restart");
    }

    logging_changed.then(|| new_config.logging.clone())
}

/// Apply logging updates to the registry until the channel closes.
pub async fn apply_log_updates(mut rx: mpsc::UnboundedReceiver<LoggingConfig>, registry: Arc<LogRegistry>) {
    while let Some(logging) = rx.recv().await {
        registry.update_config(logging);
        if let Err(e) = registry.reset_all() {
            tracing::error!(error = %e, "Logging reset failed");
        }
    }
}
