//! Host event dispatch.
//!
//! One explicit subscription registry for cross-cutting listeners. Modules
//! come and go at runtime, so listeners subscribe and unsubscribe instead of
//! being discovered.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Lifecycle events published by the host and the module framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    FrameworkReady,
    FrameworkStopping,
    ModuleStarted { id: String },
    ModuleStopped { id: String },
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::FrameworkReady => write!(f, "framework-ready"),
            HostEvent::FrameworkStopping => write!(f, "framework-stopping"),
            HostEvent::ModuleStarted { id } => write!(f, "module-started({id})"),
            HostEvent::ModuleStopped { id } => write!(f, "module-stopped({id})"),
        }
    }
}

/// Receives host events. Called on the dispatching thread.
pub trait HostEventListener: Send + Sync {
    fn on_event(&self, event: &HostEvent);
}

struct FnListener<F>(F);

impl<F> HostEventListener for FnListener<F>
where
    F: Fn(&HostEvent) + Send + Sync,
{
    fn on_event(&self, event: &HostEvent) {
        (self.0)(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscription registry with a single dispatch point.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn HostEventListener>)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn HostEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener(f)))
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener in subscription order.
    ///
    /// Listeners run outside the lock and may subscribe or unsubscribe.
    pub fn dispatch(&self, event: &HostEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        tracing::debug!(event = %event, listeners = listeners.len(), "Dispatching host event");
        for listener in listeners {
            listener.on_event(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
