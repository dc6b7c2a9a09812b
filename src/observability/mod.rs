//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (categorised by target, see crate::logging)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → console and rolling log files (crate::logging)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod metrics;
