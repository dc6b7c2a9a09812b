//! Category ownership and hot reconfiguration.
//!
//! # Responsibilities
//! - Let modules claim logging categories with a level and additivity
//! - Keep categories disjoint across owners; the root logger is never claimable
//! - Rebuild the appenders in place (`reset_all`) and replay every owner
//!
//! # State Machine
//! ```text
//! Uninitialized ──init──▶ Active ──reset_all──▶ Active ──stop──▶ Stopped
//! ```
//!
//! # Design Decisions
//! - All mutations take one writer lock; emitters only load the `ArcSwap` tree
//! - A rejected mutation commits nothing
//! - The previous appender generation is stopped after the new tree is stored

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::fmt as fmt_layer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::schema::LoggingConfig;
use crate::lifecycle::events::{HostEvent, HostEventListener};
use crate::logging::appender::AppenderSet;
use crate::logging::layer::{CategoryFilter, CategoryWriter, LoggerNode, LoggerTree};
use crate::logging::parse_level;

/// Name of the root logger. It can never be claimed by an owner.
pub const ROOT_CATEGORY: &str = "ROOT";

/// Logger configuration contributed by one owner (usually a module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerCategoryConfig {
    pub owner_id: String,
    pub categories: BTreeSet<String>,
    pub level: LevelFilter,
    pub additive: bool,
}

impl LoggerCategoryConfig {
    pub fn new<I, S>(owner_id: impl Into<String>, categories: I, level: LevelFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner_id: owner_id.into(),
            categories: categories.into_iter().map(Into::into).collect(),
            level,
            additive: false,
        }
    }

    pub fn additive(mut self, additive: bool) -> Self {
        self.additive = additive;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Active,
    Stopped,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryState::Uninitialized => write!(f, "uninitialized"),
            RegistryState::Active => write!(f, "active"),
            RegistryState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid logger configuration: {0}")]
    Validation(String),

    #[error("category '{category}' is already owned by '{owner}'")]
    Conflict { category: String, owner: String },

    #[error("owner '{0}' already has a logger configuration")]
    DuplicateOwner(String),

    #[error("log registry is {0}")]
    Inactive(RegistryState),

    #[error("failed to build appenders: {0}")]
    Appender(#[from] io::Error),
}

/// Owners and category index at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Owner configurations in registration order.
    pub owners: Vec<LoggerCategoryConfig>,
    /// Category → owner id.
    pub by_category: BTreeMap<String, String>,
}

struct RegistryInner {
    state: RegistryState,
    owners: Vec<LoggerCategoryConfig>,
    by_category: HashMap<String, String>,
    config: LoggingConfig,
    generation: u64,
}

/// Registry of logging category owners and the live appender generation.
pub struct LogRegistry {
    inner: Mutex<RegistryInner>,
    tree: Arc<ArcSwap<LoggerTree>>,
}

impl LogRegistry {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                state: RegistryState::Uninitialized,
                owners: Vec::new(),
                by_category: HashMap::new(),
                config,
                generation: 0,
            }),
            tree: Arc::new(ArcSwap::from_pointee(LoggerTree::detached())),
        }
    }

    /// Layers to install on a `tracing_subscriber::registry()`.
    ///
    /// Console and file output are separate `fmt` layers so ANSI colouring
    /// only reaches the console.
    pub fn layers<S>(&self) -> impl Layer<S> + Send + Sync + 'static
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let ansi = self.inner.lock().config.console.ansi;

        let console = fmt_layer::layer()
            .with_ansi(ansi)
            .with_thread_names(true)
            .with_writer(CategoryWriter::console(Arc::clone(&self.tree)))
            .with_filter(CategoryFilter::new(Arc::clone(&self.tree)));

        let file = fmt_layer::layer()
            .with_ansi(false)
            .with_thread_names(true)
            .with_writer(CategoryWriter::file(Arc::clone(&self.tree)))
            .with_filter(CategoryFilter::new(Arc::clone(&self.tree)));

        console.and_then(file)
    }

    /// Build the first appender generation and start emitting.
    pub fn init(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.state != RegistryState::Uninitialized {
            return Err(RegistryError::Inactive(inner.state));
        }
        self.rebuild(&mut inner)?;
        inner.state = RegistryState::Active;
        drop(inner);

        tracing::info!(target: "plughost::logging", "Log registry initialized");
        Ok(())
    }

    /// Claim `config.categories` for `config.owner_id`.
    pub fn add_category_owner(&self, mut config: LoggerCategoryConfig) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        ensure_active(&inner)?;

        if config.categories.is_empty() {
            return Err(RegistryError::Validation(format!(
                "owner '{}' declared no categories",
                config.owner_id
            )));
        }
        if config.categories.len() == 1 && config.categories.contains(ROOT_CATEGORY) {
            return Err(RegistryError::Validation(format!(
                "owner '{}' may not claim the {ROOT_CATEGORY} logger",
                config.owner_id
            )));
        }
        if config.categories.remove(ROOT_CATEGORY) {
            tracing::warn!(
                target: "plughost::logging",
                owner = %config.owner_id,
                "Dropped {ROOT_CATEGORY} from claimed categories"
            );
        }
        if inner.owners.iter().any(|o| o.owner_id == config.owner_id) {
            return Err(RegistryError::DuplicateOwner(config.owner_id));
        }
        for category in &config.categories {
            if let Some(owner) = inner.by_category.get(category) {
                return Err(RegistryError::Conflict {
                    category: category.clone(),
                    owner: owner.clone(),
                });
            }
        }

        for category in &config.categories {
            inner
                .by_category
                .insert(category.clone(), config.owner_id.clone());
        }

        let mut tree = LoggerTree::clone(&self.tree.load());
        attach(&mut tree, &config);
        self.tree.store(Arc::new(tree));

        tracing::info!(
            target: "plughost::logging",
            owner = %config.owner_id,
            categories = ?config.categories,
            level = %config.level,
            additive = config.additive,
            "Added loggers"
        );
        inner.owners.push(config);
        Ok(())
    }

    /// Release every category held by `owner_id`. Unknown owners are ignored.
    pub fn remove_category_owner(&self, owner_id: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        ensure_active(&inner)?;

        let Some(pos) = inner.owners.iter().position(|o| o.owner_id == owner_id) else {
            return Ok(());
        };
        let config = inner.owners.remove(pos);
        for category in &config.categories {
            inner.by_category.remove(category);
        }

        // Detach the owner's loggers; a host-configured logger of the same
        // name takes its place again.
        let mut tree = LoggerTree::clone(&self.tree.load());
        for category in &config.categories {
            tree.remove(category);
            if let Some(spec) = inner.config.loggers.iter().find(|s| s.name.trim() == category) {
                tree.insert(
                    category.clone(),
                    LoggerNode {
                        level: level_or_debug(&spec.level),
                        additive: spec.additive,
                    },
                );
            }
        }
        self.tree.store(Arc::new(tree));

        tracing::info!(
            target: "plughost::logging",
            owner = %owner_id,
            categories = ?config.categories,
            "Removed loggers"
        );
        Ok(())
    }

    /// Rebuild the appenders from the current logging configuration and
    /// replay the root logger, host loggers and every owner.
    pub fn reset_all(&self) -> Result<(), RegistryError> {
        let start = Instant::now();
        let mut inner = self.inner.lock();
        ensure_active(&inner)?;
        self.rebuild(&mut inner)?;
        let generation = inner.generation;
        let owners = inner.owners.len();
        drop(inner);

        tracing::info!(
            target: "plughost::logging",
            generation,
            owners,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Logging pipeline reset"
        );
        Ok(())
    }

    /// Replace the logging configuration used by the next `reset_all`.
    pub fn update_config(&self, config: LoggingConfig) {
        self.inner.lock().config = config;
    }

    /// Stop the current generation. Later mutations fail.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state == RegistryState::Stopped {
            return;
        }
        inner.state = RegistryState::Stopped;
        let previous = self.tree.swap(Arc::new(LoggerTree::detached()));
        if let Some(appenders) = previous.appenders() {
            appenders.stop();
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.lock();
        RegistrySnapshot {
            owners: inner.owners.clone(),
            by_category: inner
                .by_category
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn state(&self) -> RegistryState {
        self.inner.lock().state
    }

    /// Current appender generation; 0 before `init`.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// The live logger tree.
    pub fn logger_tree(&self) -> Arc<LoggerTree> {
        self.tree.load_full()
    }

    fn rebuild(&self, inner: &mut RegistryInner) -> Result<(), RegistryError> {
        let generation = inner.generation + 1;
        let appenders = Arc::new(AppenderSet::build(&inner.config, generation)?);

        let mut tree = LoggerTree::new(level_or_debug(&inner.config.root_level), appenders);
        for spec in &inner.config.loggers {
            tree.insert(
                spec.name.trim(),
                LoggerNode {
                    level: level_or_debug(&spec.level),
                    additive: spec.additive,
                },
            );
        }
        for owner in &inner.owners {
            attach(&mut tree, owner);
        }

        let previous = self.tree.swap(Arc::new(tree));
        inner.generation = generation;
        if let Some(appenders) = previous.appenders() {
            appenders.stop();
        }
        Ok(())
    }
}

impl HostEventListener for LogRegistry {
    fn on_event(&self, event: &HostEvent) {
        if let HostEvent::ModuleStopped { id } = event {
            if let Err(e) = self.remove_category_owner(id) {
                tracing::debug!(target: "plughost::logging", module = %id, error = %e, "Loggers not released");
            }
        }
    }
}

impl fmt::Debug for LogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LogRegistry")
            .field("state", &inner.state)
            .field("owners", &inner.owners.len())
            .field("generation", &inner.generation)
            .finish()
    }
}

fn ensure_active(inner: &RegistryInner) -> Result<(), RegistryError> {
    match inner.state {
        RegistryState::Active => Ok(()),
        state => Err(RegistryError::Inactive(state)),
    }
}

fn attach(tree: &mut LoggerTree, config: &LoggerCategoryConfig) {
    for category in &config.categories {
        tree.insert(
            category.clone(),
            LoggerNode {
                level: config.level,
                additive: config.additive,
            },
        );
    }
}

/// Unknown level names fall back to DEBUG.
fn level_or_debug(level: &str) -> LevelFilter {
    parse_level(level).unwrap_or(LevelFilter::DEBUG)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &std::path::Path) -> LogRegistry {
        let mut config = LoggingConfig::default();
        config.file.path = dir.join("host.log");
        let registry = LogRegistry::new(config);
        registry.init().unwrap();
        registry
    }

    #[test]
    fn mutations_require_active_state() {
        let registry = LogRegistry::new(LoggingConfig::default());
        let err = registry
            .add_category_owner(LoggerCategoryConfig::new("m", ["a"], LevelFilter::INFO))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Inactive(RegistryState::Uninitialized)));
    }

    #[test]
    fn empty_categories_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let err = registry
            .add_category_owner(LoggerCategoryConfig::new("m", Vec::<String>::new(), LevelFilter::INFO))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn duplicate_owner_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry
            .add_category_owner(LoggerCategoryConfig::new("m", ["a"], LevelFilter::INFO))
            .unwrap();
        let err = registry
            .add_category_owner(LoggerCategoryConfig::new("m", ["b"], LevelFilter::INFO))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateOwner(ref id) if id == "m"));
    }

    #[test]
    fn claimed_category_appears_in_tree() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry
            .add_category_owner(
                LoggerCategoryConfig::new("m", ["com.acme"], LevelFilter::TRACE).additive(true),
            )
            .unwrap();

        let tree = registry.logger_tree();
        assert_eq!(tree.effective_level("com.acme.Billing"), LevelFilter::TRACE);
        assert_eq!(tree.route_count("com.acme.Billing"), 2);
    }

    #[test]
    fn removal_restores_host_logger() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry
            .add_category_owner(LoggerCategoryConfig::new("m", ["plughost", "x"], LevelFilter::TRACE))
            .unwrap();
        assert_eq!(registry.logger_tree().effective_level("plughost"), LevelFilter::TRACE);

        registry.remove_category_owner("m").unwrap();
        let tree = registry.logger_tree();
        assert_eq!(tree.effective_level("plughost"), LevelFilter::INFO);
        assert!(tree.logger("x").is_none());
        assert!(registry.snapshot().by_category.is_empty());
    }

    #[test]
    fn reset_advances_generation() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        assert_eq!(registry.generation(), 1);
        registry.reset_all().unwrap();
        assert_eq!(registry.generation(), 2);
        assert_eq!(
            registry.logger_tree().appenders().map(|a| a.generation()),
            Some(2)
        );
    }

    #[test]
    fn stop_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let appenders = registry.logger_tree().appenders().cloned().unwrap();
        registry.stop();

        assert_eq!(registry.state(), RegistryState::Stopped);
        assert!(appenders.is_stopped());
        assert!(matches!(registry.reset_all(), Err(RegistryError::Inactive(RegistryState::Stopped))));
        assert!(registry.init().is_err());
    }

    #[test]
    fn invalid_level_falls_back_to_debug() {
        assert_eq!(level_or_debug("verbose"), LevelFilter::DEBUG);
        assert_eq!(level_or_debug("error"), LevelFilter::ERROR);
    }
}
