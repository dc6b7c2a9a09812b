//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (host, port, override)
//!     → listener.rs (port resolution, preflight, bind)
//!     → tls.rs (optional certificate loading for the HTTPS listener)
//!     → Hand off to the HTTP layer (axum-server)
//! ```
//!
//! # Design Decisions
//! - Sockets are bound with SO_REUSEADDR so restarts do not trip over TIME_WAIT
//! - TLS is optional and only touches key material when requested

pub mod listener;
pub mod tls;
