//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thread counts, queue sizes, byte sizes)
//! - Validate names the runtime parses later (levels, HTTP methods)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use axum::http::Method;

use crate::config::schema::{HostConfig, LoggingConfig};
use crate::logging::{parse_file_size, parse_level};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a whole host configuration.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.workers.core_threads == 0 {
        errors.push(ValidationError::new("workers.core_threads", "must be greater than 0"));
    }
    if config.workers.max_threads < config.workers.core_threads {
        errors.push(ValidationError::new(
            "workers.max_threads",
            "must not be lower than workers.core_threads",
        ));
    }

    if config.pipeline.allowed_methods.is_empty() {
        errors.push(ValidationError::new("pipeline.allowed_methods", "must not be empty"));
    }
    for method in &config.pipeline.allowed_methods {
        if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "pipeline.allowed_methods",
                format!("invalid HTTP method: {method}"),
            ));
        }
    }
    if config.pipeline.max_concurrent_requests == 0 {
        errors.push(ValidationError::new(
            "pipeline.max_concurrent_requests",
            "must be greater than 0",
        ));
    }

    if !config.console.route.starts_with('/') {
        errors.push(ValidationError::new("console.route", "must start with '/'"));
    }
    if config.console.redirect_paths.iter().any(|p| !p.starts_with('/')) {
        errors.push(ValidationError::new("console.redirect_paths", "paths must start with '/'"));
    }

    if config.https.enabled {
        if config.https.cert_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("https.cert_path", "required when https is enabled"));
        }
        if config.https.key_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("https.key_path", "required when https is enabled"));
        }
    }

    errors.extend(validate_logging(&config.logging));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the logging section alone (used on hot reload).
pub fn validate_logging(logging: &LoggingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if parse_level(&logging.root_level).is_none() {
        errors.push(ValidationError::new(
            "logging.root_level",
            format!("unknown level: {}", logging.root_level),
        ));
    }
    for (i, logger) in logging.loggers.iter().enumerate() {
        if logger.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("logging.loggers[{i}].name"), "must not be empty"));
        }
        if parse_level(&logger.level).is_none() {
            errors.push(ValidationError::new(
                format!("logging.loggers[{i}].level"),
                format!("unknown level: {}", logger.level),
            ));
        }
    }

    if logging.file.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("logging.file.path", "must not be empty"));
    }
    match parse_file_size(&logging.file.max_size) {
        Some(0) | None => errors.push(ValidationError::new(
            "logging.file.max_size",
            format!("invalid size: {}", logging.file.max_size),
        )),
        Some(_) => {}
    }

    let async_cfg = &logging.async_appender;
    if async_cfg.enabled {
        if async_cfg.queue_size == 0 {
            errors.push(ValidationError::new("logging.async.queue_size", "must be greater than 0"));
        }
        if async_cfg.discard_threshold > async_cfg.queue_size {
            errors.push(ValidationError::new(
                "logging.async.discard_threshold",
                "must not exceed logging.async.queue_size",
            ));
        }
    }

    errors
}
