//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! plughost.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → overrides.rs (env vars + CLI flags folded in)
//!     → HostConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → logging section handed to the log registry
//!     → registry rebuilds its appenders in place
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the logging section hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use overrides::Overrides;
pub use schema::{
    AltListenerConfig, ConsoleConfig, HostConfig, HttpsConfig, LoggingConfig, PipelineConfig,
    ServerConfig, ServerMode, WorkerConfig,
};
