//! Handler pipeline composition.
//!
//! ```text
//! network
//!   → TraceLayer
//!   → graceful_shutdown_middleware   (503 after shutdown began)
//!   → request_limit_middleware       (503 above max_concurrent_requests)
//!   → allowed_methods_middleware     (405 outside the allowed set)
//!   → console_redirect_middleware    (302 for administrative roots)
//!   → dev response headers           (development mode only)
//!   → module routes / 404 fallback
//! ```

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{HostConfig, ServerMode};
use crate::http::middleware::{
    allowed_methods_middleware, apply_dev_headers, console_redirect_middleware,
    graceful_shutdown_middleware, request_limit_middleware, AllowedMethods, ConsoleRedirect,
    GracefulGate, RequestLimiter,
};

/// The assembled router plus the shared counters its stages use.
#[derive(Clone)]
pub struct HandlerPipeline {
    pub router: Router,
    pub gate: Arc<GracefulGate>,
    pub limiter: Arc<RequestLimiter>,
}

pub fn build_pipeline(base: Router, config: &HostConfig, mode: ServerMode) -> HandlerPipeline {
    let gate = Arc::new(GracefulGate::new());
    let limiter = Arc::new(RequestLimiter::new(config.pipeline.max_concurrent_requests));
    let allowed = AllowedMethods::new(&config.pipeline.allowed_methods);

    let mut router = base.fallback(|| async { (StatusCode::NOT_FOUND, "Not found") });

    if mode == ServerMode::Dev {
        router = apply_dev_headers(router, &config.server);
    }

    match ConsoleRedirect::new(&config.console.route, &config.console.redirect_paths) {
        Some(redirect) => {
            router = router.layer(from_fn_with_state(redirect, console_redirect_middleware));
        }
        None => {
            tracing::warn!(route = %config.console.route, "Invalid console route, redirect disabled");
        }
    }

    let router = router
        .layer(from_fn_with_state(allowed, allowed_methods_middleware))
        .layer(from_fn_with_state(Arc::clone(&limiter), request_limit_middleware))
        .layer(from_fn_with_state(Arc::clone(&gate), graceful_shutdown_middleware))
        .layer(TraceLayer::new_for_http());

    tracing::debug!(
        mode = %mode,
        max_concurrent_requests = limiter.max(),
        "Handler pipeline assembled"
    );

    HandlerPipeline {
        router,
        gate,
        limiter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::routing::get;
    use tower::ServiceExt;

    fn base() -> Router {
        Router::new().route("/hello", get(|| async { "hello" }))
    }

    async fn call(pipeline: &HandlerPipeline, method: Method, path: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        pipeline.router.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn routes_reach_the_application() {
        let pipeline = build_pipeline(base(), &HostConfig::default(), ServerMode::Dev);
        let response = call(&pipeline, Method::GET, "/hello").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SERVER));
    }

    #[tokio::test]
    async fn production_skips_dev_headers() {
        let pipeline = build_pipeline(base(), &HostConfig::default(), ServerMode::Prod);
        let response = call(&pipeline, Method::GET, "/hello").await;
        assert!(!response.headers().contains_key(header::SERVER));
    }

    #[tokio::test]
    async fn root_redirects_to_console() {
        let pipeline = build_pipeline(base(), &HostConfig::default(), ServerMode::Dev);
        let response = call(&pipeline, Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/system/console");
    }

    #[tokio::test]
    async fn disallowed_method_is_rejected() {
        let mut config = HostConfig::default();
        config.pipeline.allowed_methods = vec!["GET".to_string()];
        let pipeline = build_pipeline(base(), &config, ServerMode::Dev);

        let response = call(&pipeline, Method::POST, "/hello").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn limiter_rejects_when_full() {
        let mut config = HostConfig::default();
        config.pipeline.max_concurrent_requests = 1;
        let pipeline = build_pipeline(base(), &config, ServerMode::Dev);

        let _held = pipeline.limiter.try_acquire().unwrap();
        let response = call(&pipeline, Method::GET, "/hello").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let pipeline = build_pipeline(base(), &HostConfig::default(), ServerMode::Dev);
        let response = call(&pipeline, Method::GET, "/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
