//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files, and
//! every section carries defaults so a missing file still boots.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the host.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Primary HTTP listener and server-wide settings.
    pub server: ServerConfig,

    /// Optional TLS listener.
    pub https: HttpsConfig,

    /// Optional alternate-protocol listener for a fronting proxy.
    pub alt: AltListenerConfig,

    /// Worker pool sizing.
    pub workers: WorkerConfig,

    /// Request pipeline settings.
    pub pipeline: PipelineConfig,

    /// Administrative console redirect.
    pub console: ConsoleConfig,

    /// Logging pipeline.
    pub logging: LoggingConfig,

    /// Module framework settings.
    pub modules: ModulesConfig,

    /// Metrics exporter settings.
    pub observability: ObservabilityConfig,
}

/// Server run mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Development: configured worker counts pass through, debug headers on.
    #[default]
    Dev,
    /// Production: worker pool scaled to the host, no debug headers.
    Prod,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Dev => f.write_str("DEV"),
            ServerMode::Prod => f.write_str("PROD"),
        }
    }
}

impl FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("prod") || s.eq_ignore_ascii_case("production") {
            Ok(ServerMode::Prod)
        } else if s.eq_ignore_ascii_case("dev") || s.eq_ignore_ascii_case("development") {
            Ok(ServerMode::Dev)
        } else {
            Err(format!("unknown server mode: {s}"))
        }
    }
}

/// Primary listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Run mode.
    pub mode: ServerMode,

    /// Host/interface to bind.
    pub host: String,

    /// Default port, used when no override is given.
    pub port: u16,

    /// Preflight-bind the port before anything else starts.
    pub check_port: bool,

    /// Grace period for draining in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,

    /// `Server` header value (development mode only).
    pub server_header: String,

    /// `X-Powered-By` header value (development mode only).
    pub powered_by_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::Dev,
            host: "0.0.0.0".to_string(),
            port: 8080,
            check_port: false,
            shutdown_grace_secs: 30,
            server_header: "plughost".to_string(),
            powered_by_header: "plughost".to_string(),
        }
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpsConfig {
    /// Enable the TLS listener.
    pub enabled: bool,

    /// Host/interface to bind.
    pub host: String,

    /// TLS port.
    pub port: u16,

    /// Path to the certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to the private key (PEM).
    pub key_path: PathBuf,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 8443,
            cert_path: PathBuf::from("tls/cert.pem"),
            key_path: PathBuf::from("tls/key.pem"),
        }
    }
}

/// Alternate-protocol listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AltListenerConfig {
    /// Enable the listener.
    pub enabled: bool,

    /// Host/interface to bind.
    pub host: String,

    /// Port.
    pub port: u16,
}

impl Default for AltListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8009,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Core worker threads.
    pub core_threads: usize,

    /// Maximum worker threads.
    pub max_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            core_threads: 64,
            max_threads: 128,
        }
    }
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// HTTP methods accepted by the host.
    pub allowed_methods: Vec<String>,

    /// Maximum requests in flight before new ones are rejected.
    pub max_concurrent_requests: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_concurrent_requests: 1000,
        }
    }
}

/// Administrative console redirect configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Route serving the console.
    pub route: String,

    /// Paths redirected to the console route.
    pub redirect_paths: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            route: "/system/console".to_string(),
            redirect_paths: vec!["/".to_string(), "/admin".to_string()],
        }
    }
}

/// Logging pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Root logger level.
    pub root_level: String,

    /// Console appender.
    pub console: ConsoleAppenderConfig,

    /// Rolling file appender.
    pub file: FileAppenderConfig,

    /// Async buffering in front of the file appender.
    #[serde(rename = "async")]
    pub async_appender: AsyncAppenderConfig,

    /// Host-defined base loggers, re-attached on every reset.
    pub loggers: Vec<LoggerSpec>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            root_level: "info".to_string(),
            console: ConsoleAppenderConfig::default(),
            file: FileAppenderConfig::default(),
            async_appender: AsyncAppenderConfig::default(),
            loggers: vec![LoggerSpec {
                name: "plughost".to_string(),
                level: "info".to_string(),
                additive: false,
            }],
        }
    }
}

/// Console output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Console appender configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsoleAppenderConfig {
    /// Output stream.
    pub target: ConsoleTarget,

    /// Colourise output.
    pub ansi: bool,
}

impl Default for ConsoleAppenderConfig {
    fn default() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            ansi: true,
        }
    }
}

/// Time boundary of the rolling file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    #[default]
    Daily,
    Hourly,
    /// Mostly useful for testing.
    Minutely,
}

/// Rolling file appender configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FileAppenderConfig {
    /// Active log file. Archives are written next to it.
    pub path: PathBuf,

    /// Maximum size of one file, e.g. `10MB`.
    pub max_size: String,

    /// Archived files to keep.
    pub max_history: usize,

    /// Time boundary.
    pub rotation: FileRotation,

    /// Flush after every event.
    pub immediate_flush: bool,
}

impl Default for FileAppenderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/plughost.log"),
            max_size: "10MB".to_string(),
            max_history: 30,
            rotation: FileRotation::Daily,
            immediate_flush: false,
        }
    }
}

/// Async appender configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AsyncAppenderConfig {
    /// Buffer file output through a background writer.
    pub enabled: bool,

    /// Bounded queue capacity.
    pub queue_size: usize,

    /// Remaining capacity below which INFO and lower events are dropped.
    pub discard_threshold: usize,
}

impl Default for AsyncAppenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_size: 1024,
            discard_threshold: 200,
        }
    }
}

/// A named logger defined by host configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggerSpec {
    /// Category name.
    pub name: String,

    /// Level (trace, debug, info, warn, error, off).
    pub level: String,

    /// Propagate to parent appenders.
    #[serde(default)]
    pub additive: bool,
}

/// Module framework configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModulesConfig {
    /// Root directory for module artifacts and state.
    pub root_dir: PathBuf,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("modules"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: HostConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.mode, ServerMode::Dev);
        assert_eq!(config.workers.core_threads, 64);
        assert_eq!(config.console.route, "/system/console");
    }

    #[test]
    fn async_section_is_renamed() {
        let toml = r#"
            [logging.async]
            enabled = true
            queue_size = 16
            discard_threshold = 4
        "#;
        let config: HostConfig = toml::from_str(toml).unwrap();
        assert!(config.logging.async_appender.enabled);
        assert_eq!(config.logging.async_appender.queue_size, 16);
    }

    #[test]
    fn server_mode_parses_case_insensitively() {
        assert_eq!("PROD".parse::<ServerMode>().unwrap(), ServerMode::Prod);
        assert_eq!("dev".parse::<ServerMode>().unwrap(), ServerMode::Dev);
        assert!("staging".parse::<ServerMode>().is_err());
    }
}
