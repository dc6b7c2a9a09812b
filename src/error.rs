//! Top-level boot error.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::ProvisionError;
use crate::lifecycle::StartupError;
use crate::logging::RegistryError;

/// Process exit status after a failed boot.
pub const BOOT_FAILURE_EXIT_CODE: i32 = -1;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("logging initialization failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BootError {
    pub fn exit_code(&self) -> i32 {
        BOOT_FAILURE_EXIT_CODE
    }
}
