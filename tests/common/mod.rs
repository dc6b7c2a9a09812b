//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use plughost::config::{HostConfig, LoggingConfig};
use plughost::framework::{HostModule, ModuleError, StaticFramework};
use plughost::lifecycle::HostContext;
use plughost::logging::LogRegistry;
use tokio::sync::Semaphore;

/// Logging config writing to `dir/host.log` without colours.
pub fn test_logging(dir: &Path) -> LoggingConfig {
    let mut logging = LoggingConfig::default();
    logging.console.ansi = false;
    logging.file.path = dir.join("host.log");
    logging.file.immediate_flush = true;
    logging
}

/// Host config bound to an ephemeral loopback port.
pub fn test_config(dir: &Path) -> HostConfig {
    let mut config = HostConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.shutdown_grace_secs = 5;
    config.logging = test_logging(dir);
    config.modules.root_dir = dir.join("modules");
    config
}

/// An initialised registry for `config`.
pub fn test_registry(config: &HostConfig) -> Arc<LogRegistry> {
    let registry = Arc::new(LogRegistry::new(config.logging.clone()));
    registry.init().unwrap();
    registry
}

/// A module whose `/slow` route waits for a permit from `release`.
pub struct SlowModule {
    pub release: Arc<Semaphore>,
}

impl SlowModule {
    pub fn new() -> Self {
        Self {
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

impl HostModule for SlowModule {
    fn id(&self) -> &str {
        "test.slow"
    }

    fn activate(&self, _ctx: &HostContext) -> Result<(), ModuleError> {
        Ok(())
    }

    fn routes(&self) -> Router {
        let release = Arc::clone(&self.release);
        Router::new()
            .route(
                "/slow",
                get(move || {
                    let release = Arc::clone(&release);
                    async move {
                        if let Ok(permit) = release.acquire().await {
                            permit.forget();
                        }
                        "done"
                    }
                }),
            )
            .route("/fast", get(|| async { "fast" }))
    }
}

pub fn framework_with(modules: Vec<Arc<dyn HostModule>>) -> Arc<StaticFramework> {
    Arc::new(StaticFramework::new(modules))
}

/// HTTP client that never reuses connections between requests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
