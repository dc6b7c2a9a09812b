//! In-process module framework over a fixed module list.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::Router;
use parking_lot::Mutex;

use crate::framework::{FrameworkError, HostModule, ModuleFramework};
use crate::lifecycle::events::{EventBus, HostEvent};
use crate::lifecycle::startup::HostContext;

#[derive(Default)]
struct Running {
    started: Vec<Arc<dyn HostModule>>,
    router: Router,
    events: Option<Arc<EventBus>>,
}

/// Starts its modules in registration order and stops them in reverse.
pub struct StaticFramework {
    modules: Vec<Arc<dyn HostModule>>,
    running: Mutex<Option<Running>>,
}

impl StaticFramework {
    pub fn new(modules: Vec<Arc<dyn HostModule>>) -> Self {
        Self {
            modules,
            running: Mutex::new(None),
        }
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.id().to_string()).collect()
    }

    fn stop_modules(started: Vec<Arc<dyn HostModule>>, events: Option<&EventBus>) {
        for module in started.into_iter().rev() {
            module.deactivate();
            tracing::info!(module = %module.id(), "Module stopped");
            if let Some(events) = events {
                events.dispatch(&HostEvent::ModuleStopped {
                    id: module.id().to_string(),
                });
            }
        }
    }
}

impl ModuleFramework for StaticFramework {
    fn start(&self, ctx: &HostContext) -> Result<(), FrameworkError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(FrameworkError::AlreadyStarted);
        }

        let mut state = Running {
            events: Some(Arc::clone(&ctx.events)),
            ..Default::default()
        };
        for module in &self.modules {
            if let Err(source) = module.activate(ctx) {
                let id = module.id().to_string();
                tracing::error!(module = %id, error = %source, "Module activation failed");
                Self::stop_modules(state.started, Some(&ctx.events));
                return Err(FrameworkError::Activation { module: id, source });
            }

            // axum panics on overlapping routes; turn that into a start failure.
            let merged = panic::catch_unwind(AssertUnwindSafe(|| state.router.clone().merge(module.routes())));
            let router = match merged {
                Ok(router) => router,
                Err(payload) => {
                    let id = module.id().to_string();
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(module = %id, reason = %reason, "Module routes conflict");
                    module.deactivate();
                    Self::stop_modules(state.started, Some(&ctx.events));
                    return Err(FrameworkError::RouteConflict { module: id, reason });
                }
            };

            if let Some(claim) = module.logger_claim() {
                // A rejected claim leaves the module running with inherited levels.
                if let Err(e) = ctx.log_registry.add_category_owner(claim) {
                    tracing::warn!(module = %module.id(), error = %e, "Logger claim rejected");
                }
            }

            state.router = router;
            state.started.push(Arc::clone(module));
            tracing::info!(module = %module.id(), "Module started");
            ctx.events.dispatch(&HostEvent::ModuleStarted {
                id: module.id().to_string(),
            });
        }

        *running = Some(state);
        Ok(())
    }

    fn stop(&self) {
        let Some(state) = self.running.lock().take() else {
            return;
        };
        Self::stop_modules(state.started, state.events.as_deref());
    }

    fn is_ready(&self) -> bool {
        self.running.lock().is_some()
    }

    fn router(&self) -> Router {
        self.running
            .lock()
            .as_ref()
            .map(|state| state.router.clone())
            .unwrap_or_default()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "overlapping routes".to_string())
}
