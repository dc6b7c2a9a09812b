//! Development-only response headers.

use axum::http::header::{HeaderName, HeaderValue, SERVER};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::ServerConfig;

pub const X_POWERED_BY: &str = "x-powered-by";

/// Add `Server` and `X-Powered-By` to every response of `router`.
pub fn apply_dev_headers(router: Router, config: &ServerConfig) -> Router {
    let mut router = router;
    for (name, value) in [
        (SERVER, &config.server_header),
        (HeaderName::from_static(X_POWERED_BY), &config.powered_by_header),
    ] {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                router = router.layer(SetResponseHeaderLayer::overriding(name, value));
            }
            Err(_) => {
                tracing::warn!(header = %name, value = %value, "Invalid header value, header skipped");
            }
        }
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn headers_are_added() {
        let config = ServerConfig::default();
        let router = apply_dev_headers(Router::new().route("/", get(|| async { "ok" })), &config);

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[SERVER], config.server_header.as_str());
        assert_eq!(response.headers()[X_POWERED_BY], config.powered_by_header.as_str());
    }
}
