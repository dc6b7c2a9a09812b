//! Hot-reconfigurable logging pipeline.
//!
//! # Data Flow
//! ```text
//! tracing event (target = category)
//!     → layer.rs (CategoryFilter: level from nearest configured logger)
//!     → tracing-subscriber fmt layers (console + file encoding)
//!     → layer.rs (CategoryWriter: fan-out per attached logger)
//!     → appender.rs (current AppenderSet generation)
//!         → console (stdout/stderr)
//!         → async_writer.rs (optional bounded queue) → rolling.rs (file)
//!
//! Mutations (registry.rs, single writer):
//!     add_category_owner / remove_category_owner / reset_all
//!     → build new LoggerTree → ArcSwap store → stop previous generation
//! ```
//!
//! # Design Decisions
//! - Readers never take the registry lock; they load an `ArcSwap` snapshot
//! - A category belongs to at most one owner at a time
//! - The root logger cannot be claimed by an owner

pub mod appender;
pub mod async_writer;
pub mod layer;
pub mod registry;
pub mod rolling;

pub use appender::AppenderSet;
pub use layer::{CategoryFilter, CategoryWriter, LoggerNode, LoggerTree};
pub use registry::{
    LogRegistry, LoggerCategoryConfig, RegistryError, RegistrySnapshot, RegistryState,
    ROOT_CATEGORY,
};

use tracing::level_filters::LevelFilter;

/// Parse a level name (`trace`, `debug`, `info`, `warn`/`warning`, `error`, `off`).
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "all" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Parse a byte size such as `512`, `64KB`, `10MB` or `1GB` (binary multiples).
pub fn parse_file_size(size: &str) -> Option<u64> {
    let size = size.trim();
    let split = size
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(size.len());
    let (digits, unit) = size.split_at(split);
    let value: u64 = digits.parse().ok()?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}
