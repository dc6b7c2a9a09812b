//! Shutdown coordination for the host.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only the first call broadcasts.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been triggered, including before this call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

type ShutdownAction = Box<dyn FnOnce() + Send>;

/// Named teardown actions, run in reverse registration order.
#[derive(Default)]
pub struct ShutdownSequence {
    actions: Vec<(String, ShutdownAction)>,
}

impl ShutdownSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.push((name.into(), Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action, last registered first.
    pub fn run(self) {
        for (name, action) in self.actions.into_iter().rev() {
            tracing::info!(action = %name, "Running shutdown action");
            action();
        }
    }
}

impl std::fmt::Debug for ShutdownSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait().await })
        };
        shutdown.trigger();
        waiter.await.unwrap();

        // Already triggered: returns immediately.
        shutdown.wait().await;
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn sequence_runs_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut sequence = ShutdownSequence::new();
        for name in ["framework", "server"] {
            let order = Arc::clone(&order);
            sequence.push(name, move || order.lock().unwrap().push(name));
        }
        assert_eq!(sequence.len(), 2);
        sequence.run();
        assert_eq!(*order.lock().unwrap(), vec!["server", "framework"]);
    }
}
