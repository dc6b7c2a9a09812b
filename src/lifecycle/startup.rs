//! Startup orchestration.
//!
//! # Responsibilities
//! - Run every registered startup hook exactly once, before traffic is accepted
//! - Order hooks deterministically: declared priority, then name
//! - Abort on the first failing hook and surface it as a boot failure
//!
//! # Design Decisions
//! - Fail fast: any hook error is fatal
//! - Hooks run synchronously on the booting thread, one after another
//! - Hooks that already ran are not rolled back; teardown is registered on the
//!   returned `ReadyHandle` once every hook has succeeded

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::lifecycle::events::EventBus;
use crate::lifecycle::shutdown::ShutdownSequence;
use crate::logging::LogRegistry;
use crate::observability::metrics;

/// Error type returned by hooks.
pub type HookError = Box<dyn Error + Send + Sync>;

/// Everything a hook can reach while the host boots.
pub struct HostContext {
    pub boot_id: Uuid,
    pub config: Arc<HostConfig>,
    pub log_registry: Arc<LogRegistry>,
    pub events: Arc<EventBus>,
    attributes: DashMap<String, String>,
}

impl HostContext {
    pub fn new(config: Arc<HostConfig>, log_registry: Arc<LogRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            boot_id: Uuid::new_v4(),
            config,
            log_registry,
            events,
            attributes: DashMap::new(),
        }
    }

    /// Publish an init parameter for later hooks and modules.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).map(|v| v.value().clone())
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("boot_id", &self.boot_id)
            .field("attributes", &self.attributes.len())
            .finish()
    }
}

/// A unit of setup run once when the host context is ready.
pub trait StartupHook: Send {
    /// Identity of the hook. Two hooks with the same name are the same hook.
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    fn on_startup(self: Box<Self>, ctx: &HostContext) -> Result<(), HookError>;
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("startup hook '{hook}' failed: {source}")]
    Initialization { hook: String, source: HookError },
}

/// Returned once every hook has run.
#[derive(Debug)]
pub struct ReadyHandle {
    executed: Vec<String>,
    shutdown: ShutdownSequence,
}

impl ReadyHandle {
    /// Hook names in execution order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Register teardown; actions run in reverse registration order.
    pub fn on_shutdown<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shutdown.push(name, action);
    }

    pub fn into_shutdown(self) -> ShutdownSequence {
        self.shutdown
    }
}

/// Runs startup hooks against a shared `HostContext`.
pub struct StartupOrchestrator {
    ctx: Arc<HostContext>,
}

impl StartupOrchestrator {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    pub fn run(&self, mut hooks: Vec<Box<dyn StartupHook>>) -> Result<ReadyHandle, StartupError> {
        if hooks.is_empty() {
            tracing::error!("No startup hooks registered");
            return Err(StartupError::Configuration(
                "at least one startup hook is required".to_string(),
            ));
        }

        hooks.sort_by(|a, b| (a.priority(), a.name()).cmp(&(b.priority(), b.name())));

        let mut seen = HashSet::new();
        let mut executed = Vec::with_capacity(hooks.len());
        for hook in hooks {
            let name = hook.name().to_string();
            let priority = hook.priority();
            if !seen.insert(name.clone()) {
                tracing::warn!(hook = %name, priority, "Duplicate startup hook ignored");
                continue;
            }

            tracing::info!(hook = %name, priority, "Running startup hook");
            let start = Instant::now();
            if let Err(source) = hook.on_startup(&self.ctx) {
                tracing::error!(hook = %name, error = %source, "Startup hook failed");
                return Err(StartupError::Initialization { hook: name, source });
            }
            tracing::debug!(
                hook = %name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Startup hook completed"
            );
            metrics::record_hook_executed(&name);
            executed.push(name);
        }

        Ok(ReadyHandle {
            executed,
            shutdown: ShutdownSequence::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LoggingConfig;
    use parking_lot::Mutex;

    struct Recording {
        name: &'static str,
        priority: i32,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl StartupHook for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn on_startup(self: Box<Self>, _ctx: &HostContext) -> Result<(), HookError> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err("boom".into());
            }
            Ok(())
        }
    }

    fn orchestrator() -> StartupOrchestrator {
        let ctx = HostContext::new(
            Arc::new(HostConfig::default()),
            Arc::new(LogRegistry::new(LoggingConfig::default())),
            Arc::new(EventBus::new()),
        );
        StartupOrchestrator::new(Arc::new(ctx))
    }

    fn hooks(
        specs: &[(&'static str, i32, bool)],
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Vec<Box<dyn StartupHook>> {
        specs
            .iter()
            .map(|&(name, priority, fail)| {
                Box::new(Recording {
                    name,
                    priority,
                    fail,
                    log: Arc::clone(log),
                }) as Box<dyn StartupHook>
            })
            .collect()
    }

    #[test]
    fn empty_hook_set_is_a_configuration_error() {
        let err = orchestrator().run(Vec::new()).unwrap_err();
        assert!(matches!(err, StartupError::Configuration(_)));
    }

    #[test]
    fn order_is_independent_of_registration() {
        let orchestrator = orchestrator();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        orchestrator
            .run(hooks(&[("c", 0, false), ("a", 0, false), ("b", 0, false)], &first))
            .unwrap();
        orchestrator
            .run(hooks(&[("b", 0, false), ("c", 0, false), ("a", 0, false)], &second))
            .unwrap();

        assert_eq!(*first.lock(), vec!["a", "b", "c"]);
        assert_eq!(*first.lock(), *second.lock());
    }

    #[test]
    fn priority_orders_before_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ready = orchestrator()
            .run(hooks(&[("a", 10, false), ("z", -5, false)], &log))
            .unwrap();
        assert_eq!(ready.executed(), ["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn duplicate_names_run_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        orchestrator()
            .run(hooks(&[("a", 0, false), ("a", 1, false)], &log))
            .unwrap();
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn failure_aborts_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = orchestrator()
            .run(hooks(&[("a", 0, false), ("b", 0, true), ("c", 0, false)], &log))
            .unwrap_err();

        assert!(matches!(err, StartupError::Initialization { ref hook, .. } if hook == "b"));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn context_attributes() {
        let orchestrator = orchestrator();
        let ctx = orchestrator.context();
        ctx.set_attribute("modules.root", "/srv/modules");
        assert_eq!(ctx.attribute("modules.root").as_deref(), Some("/srv/modules"));
        assert_eq!(ctx.attribute("missing"), None);
    }
}
