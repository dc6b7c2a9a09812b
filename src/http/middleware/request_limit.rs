//! Concurrent request limiter.
//!
//! Rejects with `503` instead of queueing: a request either gets a slot
//! immediately or is turned away.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

pub struct RequestLimiter {
    max: usize,
    in_flight: AtomicUsize,
}

impl RequestLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Take a slot if one is free. The slot is released when the permit drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<LimitPermit> {
        let previous = self.in_flight.fetch_add(1, Ordering::AcqRel);
        if previous >= self.max {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(LimitPermit {
            limiter: Arc::clone(self),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// A held request slot.
pub struct LimitPermit {
    limiter: Arc<RequestLimiter>,
}

impl Drop for LimitPermit {
    fn drop(&mut self) {
        self.limiter.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

pub async fn request_limit_middleware(
    State(limiter): State<Arc<RequestLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(_permit) = limiter.try_acquire() else {
        tracing::warn!(max = limiter.max(), "Request limit exceeded");
        metrics::record_rejected("limit");
        let mut response = Response::new(Body::from("Too many concurrent requests"));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        return response;
    };
    next.run(request).await
}
