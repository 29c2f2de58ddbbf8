use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    routing::{get, post},
    Router,
};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::state::AppState;

use super::handlers;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route("/resolve", post(handlers::resolve_url))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .latency_unit(LatencyUnit::Millis)
                                .level(Level::DEBUG),
                        )
                        .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
                )
                .layer(HandleErrorLayer::new(handlers::middleware_error))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use url::Url;

    use crate::{
        config::Config,
        resolver::{Resolve, ResolveError},
        utils::unix_now,
    };

    use super::*;

    const DOWNLOAD: &str = "https://video-downloads.googleusercontent.com/ADGPM2abc";

    #[derive(Default)]
    struct StubResolver {
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Resolve for StubResolver {
        async fn resolve(&self, source: &Url) -> Result<String, ResolveError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ResolveError::CdnLinkNotFound);
            }
            Ok(format!("{DOWNLOAD}?src={}", source.path()))
        }
    }

    fn app_with(resolver: StubResolver, request_timeout: Duration) -> (Router, AppState) {
        let config = Config::load_with(|_| None).unwrap();
        let state = AppState::new(Arc::new(resolver), &config);
        (router(state.clone(), request_timeout), state)
    }

    fn app(fail: bool) -> (Router, AppState) {
        app_with(
            StubResolver {
                fail,
                ..Default::default()
            },
            Duration::from_secs(5),
        )
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/resolve")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn resolves_source_url() {
        let (app, _) = app(false);
        let body = json!({"source_url": "https://links.modpro.blog/archives/146649"}).to_string();

        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(
            body["direct_download_url"],
            format!("{DOWNLOAD}?src=/archives/146649")
        );
        let expires_at = body["expires_at"].as_i64().unwrap();
        let now = unix_now();
        assert!(expires_at > now + 290 && expires_at <= now + 300);
    }

    #[tokio::test]
    async fn missing_source_url_is_rejected() {
        let (app, _) = app(false);
        let response = app.oneshot(post_json(r#"{"url": "x"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "JSON data structure mismatch"})
        );
    }

    #[tokio::test]
    async fn empty_source_url_is_rejected() {
        let (app, _) = app(false);
        let response = app.oneshot(post_json(r#"{"source_url": "  "}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "source_url is required"})
        );
    }

    #[tokio::test]
    async fn malformed_input_is_rejected() {
        let (app, _) = app(false);
        let response = app
            .clone()
            .oneshot(post_json(r#"{"source_url": "not a url"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "Invalid URL format"}));

        let response = app.clone().oneshot(post_json("{")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "JSON syntax error"}));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/resolve")
            .body(Body::from(r#"{"source_url": "https://links.modpro.blog/a"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Expected 'Content-Type: application/json' header"})
        );
    }

    #[tokio::test]
    async fn unexpected_source_host_is_still_resolved() {
        let (app, _) = app(false);
        let body = json!({"source_url": "https://example.org/archives/1"}).to_string();

        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resolution_failure_is_reported() {
        let (app, _) = app(true);
        let body = json!({"source_url": "https://links.modpro.blog/archives/146649"}).to_string();

        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Failed to resolve source URL: No CDN link found"})
        );
    }

    #[tokio::test]
    async fn closed_permits_mean_unavailable() {
        let (app, state) = app(false);
        state.permits.close();
        let body = json!({"source_url": "https://links.modpro.blog/archives/146649"}).to_string();

        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_and_info() {
        let (app, _) = app(false);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].as_i64().unwrap() > 0);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["endpoint"], "POST /resolve");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn resolve_only_accepts_post() {
        let (app, _) = app(false);
        let request = Request::builder().uri("/resolve").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await, json!({"error": "Method not allowed"}));
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let (app, _) = app(false);
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn slow_resolution_times_out_with_json_body() {
        let resolver = StubResolver {
            delay: Duration::from_secs(5),
            ..Default::default()
        };
        let (app, _) = app_with(resolver, Duration::from_millis(50));
        let body = json!({"source_url": "https://links.modpro.blog/archives/146649"}).to_string();

        let response = app.oneshot(post_json(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json_body(response).await, json!({"error": "Request timed out"}));
    }
}
