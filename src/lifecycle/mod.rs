//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Boot (host.rs):
//!     Port preflight → startup.rs (hooks by priority, then name)
//!         → hooks.rs (modules root, module framework start)
//!     → listeners start → RunningHost
//!
//! Events (events.rs):
//!     FrameworkReady / ModuleStarted / ModuleStopped / FrameworkStopping
//!     → every subscribed listener (the log registry is one of them)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!     → drain listeners → shutdown actions in reverse → log registry stops
//! ```
//!
//! # Design Decisions
//! - Hooks are ordered by (priority, name), so boot order never depends on registration order
//! - A failing hook aborts the boot; the hooks after it do not run
//! - Shutdown actions are registered only once every hook succeeded

pub mod events;
pub mod hooks;
pub mod host;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use events::{EventBus, HostEvent, HostEventListener, SubscriptionId};
pub use hooks::{FrameworkStartupHook, ModulesRootHook, MODULES_ROOT_ATTRIBUTE};
pub use host::{Host, RunningHost};
pub use shutdown::{Shutdown, ShutdownSequence};
pub use signals::{forward_signals, shutdown_signal};
pub use startup::{HookError, HostContext, ReadyHandle, StartupError, StartupHook, StartupOrchestrator};
