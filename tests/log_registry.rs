//! Log registry behaviour through a real `tracing` subscriber.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use plughost::config::LoggingConfig;
use plughost::logging::{LogRegistry, LoggerCategoryConfig, RegistryError, ROOT_CATEGORY};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

mod common;

fn active_registry(dir: &Path) -> LogRegistry {
    let registry = LogRegistry::new(common::test_logging(dir));
    registry.init().unwrap();
    registry
}

fn count_lines(path: &Path, needle: &str) -> usize {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|line| line.contains(needle))
        .count()
}

#[test]
fn category_has_a_single_owner() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());

    registry
        .add_category_owner(LoggerCategoryConfig::new("billing", ["com.acme.billing"], LevelFilter::DEBUG))
        .unwrap();
    let before = registry.snapshot();

    let err = registry
        .add_category_owner(LoggerCategoryConfig::new(
            "audit",
            ["com.acme.audit", "com.acme.billing"],
            LevelFilter::INFO,
        ))
        .unwrap_err();

    match err {
        RegistryError::Conflict { category, owner } => {
            assert_eq!(category, "com.acme.billing");
            assert_eq!(owner, "billing");
        }
        other => panic!("unexpected error: {other}"),
    }
    // A rejected claim takes nothing, including its uncontested categories.
    assert_eq!(registry.snapshot(), before);
    assert!(registry.logger_tree().logger("com.acme.audit").is_none());
}

#[test]
fn root_logger_cannot_be_owned() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());

    let err = registry
        .add_category_owner(LoggerCategoryConfig::new("greedy", [ROOT_CATEGORY], LevelFilter::TRACE))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    registry
        .add_category_owner(LoggerCategoryConfig::new(
            "mixed",
            [ROOT_CATEGORY, "com.acme"],
            LevelFilter::TRACE,
        ))
        .unwrap();
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.by_category.len(), 1);
    assert_eq!(snapshot.by_category.get("com.acme").map(String::as_str), Some("mixed"));
    assert_eq!(registry.logger_tree().root_level(), LevelFilter::INFO);
}

#[test]
fn reset_keeps_owners_and_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());
    registry
        .add_category_owner(LoggerCategoryConfig::new("billing", ["com.acme.billing"], LevelFilter::TRACE))
        .unwrap();
    let before = registry.snapshot();

    registry.reset_all().unwrap();
    registry.reset_all().unwrap();

    assert_eq!(registry.snapshot(), before);
    assert_eq!(registry.generation(), 3);
    assert_eq!(
        registry.logger_tree().effective_level("com.acme.billing.Invoice"),
        LevelFilter::TRACE
    );
}

#[test]
fn removing_an_unknown_owner_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());
    let before = registry.snapshot();

    registry.remove_category_owner("nobody").unwrap();
    assert_eq!(registry.snapshot(), before);
}

#[test]
fn owner_level_and_additivity_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());
    let log_file = dir.path().join("host.log");

    registry
        .add_category_owner(
            LoggerCategoryConfig::new("billing", ["com.acme.billing"], LevelFilter::DEBUG).additive(true),
        )
        .unwrap();
    registry
        .add_category_owner(LoggerCategoryConfig::new("audit", ["com.acme.audit"], LevelFilter::WARN))
        .unwrap();

    let subscriber = tracing_subscriber::registry().with(registry.layers());
    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!(target: "com.acme.billing", "invoice-drafted");
        tracing::info!(target: "com.acme.audit", "audit-info");
        tracing::warn!(target: "com.acme.audit", "audit-warn");
        tracing::debug!(target: "com.acme.other", "other-debug");
    });
    registry.stop();

    // Additive: written by the owner's logger and again by root.
    assert_eq!(count_lines(&log_file, "invoice-drafted"), 2);
    assert_eq!(count_lines(&log_file, "audit-info"), 0);
    assert_eq!(count_lines(&log_file, "audit-warn"), 1);
    // Unowned categories follow the root level.
    assert_eq!(count_lines(&log_file, "other-debug"), 0);
}

#[test]
fn released_category_falls_back_to_root() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());
    let log_file = dir.path().join("host.log");

    registry
        .add_category_owner(LoggerCategoryConfig::new("billing", ["com.acme.billing"], LevelFilter::TRACE))
        .unwrap();

    let subscriber = tracing_subscriber::registry().with(registry.layers());
    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!(target: "com.acme.billing", "while-owned");
        registry.remove_category_owner("billing").unwrap();
        tracing::debug!(target: "com.acme.billing", "after-release");
    });
    registry.stop();

    assert_eq!(count_lines(&log_file, "while-owned"), 1);
    assert_eq!(count_lines(&log_file, "after-release"), 0);
}

#[test]
fn reload_switches_file_appender() {
    let dir = tempfile::tempdir().unwrap();
    let registry = active_registry(dir.path());

    let mut updated: LoggingConfig = common::test_logging(dir.path());
    updated.file.path = dir.path().join("reloaded.log");

    let subscriber = tracing_subscriber::registry().with(registry.layers());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "com.acme", "first-generation");
        registry.update_config(updated);
        registry.reset_all().unwrap();
        tracing::info!(target: "com.acme", "second-generation");
    });
    registry.stop();

    assert_eq!(count_lines(&dir.path().join("host.log"), "first-generation"), 1);
    assert_eq!(count_lines(&dir.path().join("host.log"), "second-generation"), 0);
    assert_eq!(count_lines(&dir.path().join("reloaded.log"), "second-generation"), 1);
}

#[test]
fn emitting_during_resets_never_blocks() {
    const EMITTERS: usize = 4;
    const EVENTS: usize = 5_000;
    const CYCLES: usize = 50;

    let dir = tempfile::tempdir().unwrap();
    let mut logging = common::test_logging(dir.path());
    logging.file.immediate_flush = false;
    logging.async_appender.enabled = true;
    let registry = Arc::new(LogRegistry::new(logging));
    registry.init().unwrap();

    let start = Instant::now();
    let emitters: Vec<_> = (0..EMITTERS)
        .map(|n| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let subscriber = tracing_subscriber::registry().with(registry.layers());
                tracing::subscriber::with_default(subscriber, || {
                    for i in 0..EVENTS {
                        tracing::warn!(target: "com.acme.load", emitter = n, i, "busy");
                    }
                });
            })
        })
        .collect();

    for cycle in 0..CYCLES {
        registry
            .add_category_owner(LoggerCategoryConfig::new(
                format!("owner-{cycle}"),
                [format!("com.acme.owner{cycle}")],
                LevelFilter::DEBUG,
            ))
            .unwrap();
        registry.reset_all().unwrap();
    }

    for emitter in emitters {
        emitter.join().unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(60));

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.owners.len(), CYCLES);
    assert_eq!(snapshot.by_category.len(), CYCLES);
    assert_eq!(registry.generation(), CYCLES as u64 + 1);
    registry.stop();
}
