//! Redirect administrative roots to the console.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Paths answered with `302 Found` to the console route.
#[derive(Clone)]
pub struct ConsoleRedirect {
    location: HeaderValue,
    paths: Arc<[String]>,
}

impl ConsoleRedirect {
    pub fn new(console_route: &str, paths: &[String]) -> Option<Self> {
        let location = HeaderValue::from_str(console_route).ok()?;
        let paths = paths.iter().map(|p| normalize(p).to_string()).collect();
        Some(Self { location, paths })
    }

    /// Trailing slashes are ignored: `/admin/` matches `/admin`.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        self.paths.iter().any(|p| p == path)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_end_matches('/')
}

pub async fn console_redirect_middleware(
    State(redirect): State<ConsoleRedirect>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !redirect.matches(request.uri().path()) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Redirecting to console");
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response
        .headers_mut()
        .insert(header::LOCATION, redirect.location.clone());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_roots_with_or_without_slash() {
        let redirect =
            ConsoleRedirect::new("/system/console", &["/".to_string(), "/admin".to_string()]).unwrap();
        assert!(redirect.matches("/"));
        assert!(redirect.matches("/admin"));
        assert!(redirect.matches("/admin/"));
        assert!(!redirect.matches("/admin/users"));
        assert!(!redirect.matches("/system/console"));
    }
}
