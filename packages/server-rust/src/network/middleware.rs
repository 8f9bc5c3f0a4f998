//! HTTP middleware stack.
//!
//! Layers are listed outermost first: the first layer sees the request first
//! and the response last.

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// The composed layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        CorsLayer,
        tower::layer::util::Stack<
            CompressionLayer,
            tower::layer::util::Stack<
                TraceLayer<
                    tower_http::classify::SharedClassifier<
                        tower_http::classify::ServerErrorsAsFailures,
                    >,
                >,
                tower::layer::util::Stack<
                    SetRequestIdLayer<MakeRequestUuid>,
                    tower::layer::util::Identity,
                >,
            >,
        >,
    >,
>;

/// Builds the middleware shared by every route.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns an `X-Request-Id` to every request
/// 2. `Tracing` -- request/response spans
/// 3. `Compression` -- gzip responses (error lists can be large)
/// 4. `CORS`
/// 5. `PropagateRequestId` -- copies `X-Request-Id` onto the response
///
/// There is no global timeout: a validation runs to completion however long
/// the file takes. Probes get [`probe_timeout_layer`] instead.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// Timeout for the health routes only.
#[must_use]
pub fn probe_timeout_layer(config: &NetworkConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.probe_timeout)
}

/// A `"*"` entry allows any origin; otherwise only the parseable entries.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_ENCODING};
    use axum::http::Request;
    use axum::response::Response;
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::test_state;
    use crate::network::router;
    use crate::service::ValidationConfig;

    async fn send(config: &NetworkConfig, request: Request<Body>) -> Response {
        router(test_state(ValidationConfig::default()), config)
            .oneshot(request)
            .await
            .unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/validate_csv")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = NetworkConfig {
            max_body_bytes: 16,
            ..NetworkConfig::default()
        };
        let body = serde_json::json!({ "file_path": "/".repeat(64) }).to_string();
        let response = send(
            &config,
            Request::builder()
                .method(Method::POST)
                .uri("/validate_csv")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn wildcard_cors_allows_any_origin() {
        let response = send(&NetworkConfig::default(), preflight("http://example.com")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn listed_cors_origins_only() {
        let config = NetworkConfig {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "not a header value\n".to_string(),
            ],
            ..NetworkConfig::default()
        };

        let allowed = send(&config, preflight("http://localhost:3000")).await;
        assert_eq!(
            allowed.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );

        let denied = send(&config, preflight("http://evil.example")).await;
        assert!(!denied.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn gzip_when_requested() {
        let response = send(
            &NetworkConfig::default(),
            Request::builder()
                .uri("/health")
                .header("accept-encoding", "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    }
}
