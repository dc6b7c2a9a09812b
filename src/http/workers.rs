//! Worker pool sizing.
//!
//! Production hosts get at least eight workers per CPU and a ceiling of at
//! least twice the core count. Configured values are never lowered.
//! Development mode passes the configured values through.

use crate::config::ServerMode;

const WORKERS_PER_CPU: usize = 8;

/// Resolved worker pool: `core` async workers, `max` blocking threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    pub core: usize,
    pub max: usize,
}

pub fn size_worker_pool(
    mode: ServerMode,
    cpu_count: usize,
    configured_core: usize,
    configured_max: usize,
) -> WorkerPool {
    match mode {
        ServerMode::Dev => WorkerPool {
            core: configured_core,
            max: configured_max,
        },
        ServerMode::Prod => {
            let core = configured_core.max(cpu_count.saturating_mul(WORKERS_PER_CPU));
            let max = configured_max.max(core.saturating_mul(2));
            WorkerPool { core, max }
        }
    }
}
