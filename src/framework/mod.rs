//! Module framework seam.
//!
//! # Data Flow
//! ```text
//! FrameworkStartupHook
//!     → ModuleFramework::start(ctx)
//!         → each HostModule: activate, claim logger categories, contribute routes
//!         → HostEvent::ModuleStarted
//!     → HostEvent::FrameworkReady
//!     → ModuleFramework::router() handed to the server provisioner
//!
//! Shutdown:
//!     ModuleFramework::stop()
//!         → each HostModule (reverse order): deactivate
//!         → HostEvent::ModuleStopped (log registry releases the module's categories)
//! ```
//!
//! # Design Decisions
//! - The host only sees the trait; loading and unloading code is the framework's business
//! - `StaticFramework` is the in-process implementation used by the binary and tests

pub mod console;
pub mod static_framework;

use std::error::Error;

use axum::Router;
use thiserror::Error;

use crate::lifecycle::startup::HostContext;
use crate::logging::LoggerCategoryConfig;

pub use console::ConsoleModule;
pub use static_framework::StaticFramework;

/// Error type returned by modules.
pub type ModuleError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("module framework already started")]
    AlreadyStarted,

    #[error("module '{module}' failed to activate: {source}")]
    Activation { module: String, source: ModuleError },

    #[error("module '{module}' has conflicting routes: {reason}")]
    RouteConflict { module: String, reason: String },
}

/// The external module framework as the host consumes it.
pub trait ModuleFramework: Send + Sync {
    fn start(&self, ctx: &HostContext) -> Result<(), FrameworkError>;

    /// Stop every module. No-op when not started.
    fn stop(&self);

    fn is_ready(&self) -> bool;

    /// Routes contributed by the started modules.
    fn router(&self) -> Router;
}

/// A pluggable code unit hosted by `StaticFramework`.
pub trait HostModule: Send + Sync {
    fn id(&self) -> &str;

    fn activate(&self, _ctx: &HostContext) -> Result<(), ModuleError> {
        Ok(())
    }

    fn deactivate(&self) {}

    fn routes(&self) -> Router {
        Router::new()
    }

    /// Logging categories this module wants to own while it runs.
    fn logger_claim(&self) -> Option<LoggerCategoryConfig> {
        None
    }
}
