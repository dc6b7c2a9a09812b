//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (axum-server)
//!     → pipeline.rs (layered interceptors, see middleware/)
//!     → module routes (from the module framework)
//!     → Send to client
//!
//! server.rs owns the listener set: port resolution, TLS, alternate
//! listener, start and bounded stop.
//! workers.rs sizes the runtime for the run mode.
//! ```

pub mod middleware;
pub mod pipeline;
pub mod server;
pub mod workers;

pub use pipeline::{build_pipeline, HandlerPipeline};
pub use server::{ListenerKind, ProvisionError, RunningServer, ServerProvisioner, StopReport};
pub use workers::{size_worker_pool, WorkerPool};
