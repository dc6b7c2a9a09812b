//! Request interceptors of the handler pipeline.
//!
//! Listed innermost (closest to the application) to outermost:
//! - headers.rs: development-only response headers
//! - console_redirect.rs: administrative roots → console route
//! - allowed_methods.rs: 405 outside the configured method set
//! - request_limit.rs: 503 once too many requests are in flight
//! - graceful.rs: 503 once shutdown has begun, drains in-flight work
//!
//! Stages share state only through atomics; none takes a lock.

pub mod allowed_methods;
pub mod console_redirect;
pub mod graceful;
pub mod headers;
pub mod request_limit;

pub use allowed_methods::{allowed_methods_middleware, AllowedMethods};
pub use console_redirect::{console_redirect_middleware, ConsoleRedirect};
pub use graceful::{graceful_shutdown_middleware, GracefulGate};
pub use headers::apply_dev_headers;
pub use request_limit::{request_limit_middleware, RequestLimiter};
