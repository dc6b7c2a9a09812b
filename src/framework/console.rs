//! System console module.
//!
//! Serves a JSON status document at the configured console route. The
//! pipeline's redirect stage sends administrative roots here.

use std::sync::{Arc, OnceLock};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

use crate::framework::{HostModule, ModuleError};
use crate::lifecycle::startup::HostContext;
use crate::logging::{LogRegistry, LoggerCategoryConfig};

pub const CONSOLE_MODULE_ID: &str = "plughost.console";

#[derive(Default)]
struct ConsoleState {
    boot_id: OnceLock<Uuid>,
    started_at: OnceLock<DateTime<Utc>>,
    mode: OnceLock<String>,
    log_registry: OnceLock<Arc<LogRegistry>>,
}

#[derive(Debug, Serialize)]
struct ConsoleStatus {
    status: &'static str,
    boot_id: Option<Uuid>,
    mode: Option<String>,
    started_at: Option<DateTime<Utc>>,
    logging: Option<LoggingStatus>,
}

#[derive(Debug, Serialize)]
struct LoggingStatus {
    state: String,
    generation: u64,
    owners: Vec<String>,
}

pub struct ConsoleModule {
    route: String,
    state: Arc<ConsoleState>,
}

impl ConsoleModule {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            state: Arc::new(ConsoleState::default()),
        }
    }
}

impl HostModule for ConsoleModule {
    fn id(&self) -> &str {
        CONSOLE_MODULE_ID
    }

    fn activate(&self, ctx: &HostContext) -> Result<(), ModuleError> {
        let _ = self.state.boot_id.set(ctx.boot_id);
        let _ = self.state.started_at.set(Utc::now());
        let _ = self.state.mode.set(ctx.config.server.mode.to_string());
        let _ = self.state.log_registry.set(Arc::clone(&ctx.log_registry));
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route(&self.route, get(console_status))
            .with_state(Arc::clone(&self.state))
    }

    fn logger_claim(&self) -> Option<LoggerCategoryConfig> {
        Some(LoggerCategoryConfig::new(
            CONSOLE_MODULE_ID,
            ["plughost::framework::console"],
            LevelFilter::INFO,
        ))
    }
}

async fn console_status(State(state): State<Arc<ConsoleState>>) -> Json<ConsoleStatus> {
    tracing::debug!("Console status requested");
    let logging = state.log_registry.get().map(|registry| LoggingStatus {
        state: registry.state().to_string(),
        generation: registry.generation(),
        owners: registry
            .snapshot()
            .owners
            .into_iter()
            .map(|o| o.owner_id)
            .collect(),
    });

    Json(ConsoleStatus {
        status: "running",
        boot_id: state.boot_id.get().copied(),
        mode: state.mode.get().cloned(),
        started_at: state.started_at.get().copied(),
        logging,
    })
}
