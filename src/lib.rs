//! Bootstrap and lifecycle core for a pluggable module host.

pub mod config;
pub mod error;
pub mod framework;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod net;
pub mod observability;

pub use config::schema::HostConfig;
pub use error::BootError;
pub use framework::{ConsoleModule, HostModule, ModuleFramework, StaticFramework};
pub use lifecycle::{Host, RunningHost, Shutdown};
pub use logging::LogRegistry;
