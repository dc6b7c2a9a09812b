//! Allowed HTTP methods filter.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

/// The configured method set and its precomputed `Allow` header.
#[derive(Clone)]
pub struct AllowedMethods {
    methods: Arc<[Method]>,
    allow: HeaderValue,
}

impl AllowedMethods {
    /// Unparseable names are skipped; configuration validation reports them.
    pub fn new(names: &[String]) -> Self {
        let mut methods: Vec<Method> = Vec::new();
        for name in names {
            match Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes()) {
                Ok(method) if !methods.contains(&method) => methods.push(method),
                Ok(_) => {}
                Err(_) => tracing::warn!(method = %name, "Ignoring invalid HTTP method"),
            }
        }
        let allow = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            allow: HeaderValue::from_str(&allow).unwrap_or_else(|_| HeaderValue::from_static("")),
            methods: methods.into(),
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

pub async fn allowed_methods_middleware(
    State(allowed): State<AllowedMethods>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if allowed.allows(request.method()) {
        return next.run(request).await;
    }

    tracing::debug!(method = %request.method(), path = %request.uri().path(), "Method not allowed");
    metrics::record_rejected("method");
    let mut response = Response::new(Body::from("Method not allowed"));
    *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    response
        .headers_mut()
        .insert(header::ALLOW, allowed.allow.clone());
    response
}
