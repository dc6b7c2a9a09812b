//! Process-level overrides.
//!
//! Environment variables and command-line flags that take precedence over the
//! configuration file. Flags from the command line are merged over the
//! environment; boolean switches can only turn features on.

use crate::config::loader::ConfigError;
use crate::config::schema::{HostConfig, ServerMode};

pub const ENV_SERVER_PORT: &str = "PLUGHOST_SERVER_PORT";
pub const ENV_CHECK_PORT: &str = "PLUGHOST_CHECK_PORT";
pub const ENV_SERVER_MODE: &str = "PLUGHOST_SERVER_MODE";
pub const ENV_ENABLE_HTTPS: &str = "PLUGHOST_ENABLE_HTTPS";
pub const ENV_ENABLE_ALT: &str = "PLUGHOST_ENABLE_ALT";
pub const ENV_LOG_ASYNC: &str = "PLUGHOST_LOG_ASYNC";
pub const ENV_LOG_IMMEDIATE_FLUSH: &str = "PLUGHOST_LOG_IMMEDIATE_FLUSH";

/// Overrides resolved from the process environment and CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Listener port; wins over `server.port`.
    pub port: Option<u16>,
    pub check_port: bool,
    pub mode: Option<ServerMode>,
    pub enable_https: bool,
    pub enable_alt: bool,
    pub log_async: bool,
    pub log_immediate_flush: bool,
}

impl Overrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(ENV_SERVER_PORT).filter(|v| !v.trim().is_empty()) {
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidOverride {
                    key: ENV_SERVER_PORT.to_string(),
                    value,
                }
            })?),
            None => None,
        };

        let mode = match lookup(ENV_SERVER_MODE).filter(|v| !v.trim().is_empty()) {
            Some(value) => Some(value.trim().parse::<ServerMode>().map_err(|_| {
                ConfigError::InvalidOverride {
                    key: ENV_SERVER_MODE.to_string(),
                    value,
                }
            })?),
            None => None,
        };

        let flag = |key: &str| lookup(key).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Ok(Self {
            port,
            check_port: flag(ENV_CHECK_PORT),
            mode,
            enable_https: flag(ENV_ENABLE_HTTPS),
            enable_alt: flag(ENV_ENABLE_ALT),
            log_async: flag(ENV_LOG_ASYNC),
            log_immediate_flush: flag(ENV_LOG_IMMEDIATE_FLUSH),
        })
    }

    /// Merge `other` over `self`.
    pub fn merge(self, other: Overrides) -> Overrides {
        Overrides {
            port: other.port.or(self.port),
            check_port: self.check_port || other.check_port,
            mode: other.mode.or(self.mode),
            enable_https: self.enable_https || other.enable_https,
            enable_alt: self.enable_alt || other.enable_alt,
            log_async: self.log_async || other.log_async,
            log_immediate_flush: self.log_immediate_flush || other.log_immediate_flush,
        }
    }

    /// Fold the switches into the configuration.
    ///
    /// The port stays out of the config on purpose: it is resolved by the
    /// server provisioner so the chosen source can be logged.
    pub fn apply(&self, config: &mut HostConfig) {
        if let Some(mode) = self.mode {
            config.server.mode = mode;
        }
        config.server.check_port |= self.check_port;
        config.https.enabled |= self.enable_https;
        config.alt.enabled |= self.enable_alt;
        config.logging.async_appender.enabled |= self.log_async;
        config.logging.file.immediate_flush |= self.log_immediate_flush;
    }
}
