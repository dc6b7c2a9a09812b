//! Graceful shutdown gate.
//!
//! Once shutdown begins, new requests get `503` while requests already inside
//! the gate run to completion. `drain` waits for them, bounded by the grace
//! period.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Notify;

use crate::observability::metrics;

#[derive(Default)]
pub struct GracefulGate {
    shutting_down: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

impl GracefulGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a request unless shutdown has begun.
    pub fn try_enter(self: &Arc<Self>) -> Option<GateGuard> {
        // Count first, then check: `drain` never misses a request that got in.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.shutting_down.load(Ordering::SeqCst) {
            self.leave();
            return None;
        }
        metrics::set_in_flight(self.in_flight());
        Some(GateGuard {
            gate: Arc::clone(self),
        })
    }

    fn leave(&self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.shutting_down.load(Ordering::SeqCst) {
            self.drained.notify_waiters();
        }
    }

    pub fn begin_shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::info!(in_flight = self.in_flight(), "Graceful shutdown started, rejecting new requests");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight. Returns false if `grace` ran out first.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, wait).await.is_ok()
    }
}

/// Marks one request inside the gate.
pub struct GateGuard {
    gate: Arc<GracefulGate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.leave();
        metrics::set_in_flight(self.gate.in_flight());
    }
}

pub async fn graceful_shutdown_middleware(
    State(gate): State<Arc<GracefulGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(_guard) = gate.try_enter() else {
        tracing::debug!(path = %request.uri().path(), "Rejecting request during shutdown");
        metrics::record_rejected("shutdown");
        let mut response = Response::new(Body::from("Server is shutting down"));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        return response;
    };
    next.run(request).await
}
