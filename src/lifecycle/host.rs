//! Boot and shutdown sequencing.
//!
//! ```text
//! boot:     port preflight → startup hooks (framework starts, FrameworkReady)
//!           → readiness check → listeners start
//! shutdown: FrameworkStopping → drain + close listeners
//!           → shutdown actions (reverse) → log registry stops
//! ```
//!
//! A boot failure stops the module framework if it was started. The log
//! registry stays active so the caller can still report the failure.

use std::sync::Arc;
use std::time::Duration;

use crate::config::HostConfig;
use crate::error::BootError;
use crate::framework::ModuleFramework;
use crate::http::{ListenerKind, RunningServer, ServerProvisioner, StopReport};
use crate::lifecycle::events::{EventBus, HostEvent, SubscriptionId};
use crate::lifecycle::hooks::{FrameworkStartupHook, ModulesRootHook};
use crate::lifecycle::shutdown::ShutdownSequence;
use crate::lifecycle::startup::{HostContext, StartupHook, StartupOrchestrator};
use crate::logging::LogRegistry;

/// A host that has not booted yet.
pub struct Host {
    ctx: Arc<HostContext>,
    framework: Arc<dyn ModuleFramework>,
    provisioner: ServerProvisioner,
    hooks: Vec<Box<dyn StartupHook>>,
}

impl Host {
    pub fn new(
        config: Arc<HostConfig>,
        log_registry: Arc<LogRegistry>,
        framework: Arc<dyn ModuleFramework>,
        port_override: Option<u16>,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let ctx = Arc::new(HostContext::new(Arc::clone(&config), log_registry, events));
        Self {
            ctx,
            framework,
            provisioner: ServerProvisioner::new(config, port_override),
            hooks: Vec::new(),
        }
    }

    /// Register the modules-root and framework startup hooks.
    pub fn with_default_hooks(self) -> Self {
        let framework = Arc::clone(&self.framework);
        self.with_hook(ModulesRootHook)
            .with_hook(FrameworkStartupHook::new(framework))
    }

    pub fn with_hook(mut self, hook: impl StartupHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    pub fn provisioner(&self) -> &ServerProvisioner {
        &self.provisioner
    }

    pub async fn boot(self) -> Result<RunningHost, BootError> {
        let Host {
            ctx,
            framework,
            provisioner,
            hooks,
        } = self;

        tracing::info!(boot_id = %ctx.boot_id, mode = %provisioner.mode(), "Host booting");
        let subscription = ctx.events.subscribe(ctx.log_registry.clone());

        // Fails before any module starts when the port is taken.
        let port = match provisioner.resolve_port() {
            Ok(port) => port,
            Err(e) => {
                ctx.events.unsubscribe(subscription);
                return Err(e.into());
            }
        };

        let orchestrator = StartupOrchestrator::new(Arc::clone(&ctx));
        let mut ready = match orchestrator.run(hooks) {
            Ok(ready) => ready,
            Err(e) => {
                cleanup(framework.as_ref(), &ctx.events, subscription);
                return Err(e.into());
            }
        };

        let stopping = Arc::clone(&framework);
        ready.on_shutdown("module-framework", move || stopping.stop());

        if !framework.is_ready() {
            cleanup(framework.as_ref(), &ctx.events, subscription);
            return Err(BootError::Configuration(
                "module framework is not ready after startup hooks".to_string(),
            ));
        }

        let server = match provisioner.start_on(port, framework.router()).await {
            Ok(server) => server,
            Err(e) => {
                cleanup(framework.as_ref(), &ctx.events, subscription);
                return Err(e.into());
            }
        };

        tracing::info!(
            boot_id = %ctx.boot_id,
            hooks = ?ready.executed(),
            "Host ready"
        );

        Ok(RunningHost {
            ctx,
            server,
            shutdown: ready.into_shutdown(),
            subscription,
        })
    }
}

fn cleanup(framework: &dyn ModuleFramework, events: &EventBus, subscription: SubscriptionId) {
    if framework.is_ready() {
        tracing::warn!("Stopping module framework after failed boot");
        events.dispatch(&HostEvent::FrameworkStopping);
        framework.stop();
    }
    events.unsubscribe(subscription);
}

/// A booted host serving traffic.
pub struct RunningHost {
    ctx: Arc<HostContext>,
    server: RunningServer,
    shutdown: ShutdownSequence,
    subscription: SubscriptionId,
}

impl RunningHost {
    pub fn context(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    pub fn server(&self) -> &RunningServer {
        &self.server
    }

    pub fn http_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.local_addr(ListenerKind::Http)
    }

    /// Drain and close the listeners, tear down in reverse order, stop logging.
    pub async fn shutdown(self, grace: Duration) -> StopReport {
        tracing::info!(boot_id = %self.ctx.boot_id, "Host shutting down");
        self.ctx.events.dispatch(&HostEvent::FrameworkStopping);

        let report = self.server.stop(grace).await;
        self.shutdown.run();
        self.ctx.events.unsubscribe(self.subscription);

        tracing::info!("Shutdown complete");
        self.ctx.log_registry.stop();
        report
    }
}
