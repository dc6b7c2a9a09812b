//! Built-in startup hooks.

use std::fs;
use std::sync::Arc;

use crate::framework::ModuleFramework;
use crate::lifecycle::events::HostEvent;
use crate::lifecycle::startup::{HookError, HostContext, StartupHook};

/// Context attribute holding the modules root directory.
pub const MODULES_ROOT_ATTRIBUTE: &str = "modules.root";

/// Prepares the modules root directory. Runs before everything else.
pub struct ModulesRootHook;

impl StartupHook for ModulesRootHook {
    fn name(&self) -> &str {
        "modules-root"
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn on_startup(self: Box<Self>, ctx: &HostContext) -> Result<(), HookError> {
        let root = &ctx.config.modules.root_dir;
        fs::create_dir_all(root)?;
        ctx.set_attribute(MODULES_ROOT_ATTRIBUTE, root.display().to_string());
        tracing::info!(root = %root.display(), "Modules root ready");
        Ok(())
    }
}

/// Starts the module framework and announces readiness.
pub struct FrameworkStartupHook {
    framework: Arc<dyn ModuleFramework>,
}

impl FrameworkStartupHook {
    pub fn new(framework: Arc<dyn ModuleFramework>) -> Self {
        Self { framework }
    }
}

impl StartupHook for FrameworkStartupHook {
    fn name(&self) -> &str {
        "module-framework"
    }

    fn on_startup(self: Box<Self>, ctx: &HostContext) -> Result<(), HookError> {
        self.framework.start(ctx)?;
        ctx.events.dispatch(&HostEvent::FrameworkReady);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::lifecycle::events::EventBus;
    use crate::logging::LogRegistry;

    #[test]
    fn modules_root_is_created_and_published() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HostConfig::default();
        config.modules.root_dir = dir.path().join("modules");
        let ctx = HostContext::new(
            Arc::new(config.clone()),
            Arc::new(LogRegistry::new(config.logging.clone())),
            Arc::new(EventBus::new()),
        );

        Box::new(ModulesRootHook).on_startup(&ctx).unwrap();

        assert!(config.modules.root_dir.is_dir());
        assert_eq!(
            ctx.attribute(MODULES_ROOT_ATTRIBUTE),
            Some(config.modules.root_dir.display().to_string())
        );
    }
}
