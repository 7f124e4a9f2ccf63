//! Cadastro dashboard library.
//!
//! Customer registration API backed by Celcoin (CEL Payments), with an
//! in-memory "demo mode" fallback store for when the provider cannot serve
//! a write. The binary in `main.rs` only loads configuration, sets up
//! tracing and Sentry, and serves [`app`].
//!
//! # Modules
//!
//! - [`celcoin`] - Provider client and access token acquisition
//! - [`customers`] - Data access layer, fallback store, listing cache
//! - [`view`] - Session-scoped table state and dashboard view
//! - [`cep`] - ViaCEP postal code lookup
//! - [`routes`] / [`middleware`] - HTTP surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod celcoin;
pub mod cep;
pub mod config;
pub mod customers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod view;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Build the full router: routes, sessions, request ids and request tracing.
///
/// Sentry layers are added by the binary, outermost.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::config::{CelcoinConfig, DashboardConfig, DemoUserConfig};

    fn config() -> DashboardConfig {
        DashboardConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            listing_cache_ttl: Duration::from_secs(300),
            celcoin: CelcoinConfig {
                // Nothing listens on the discard port.
                base_url: Url::parse("http://127.0.0.1:9/v2").unwrap(),
                credentials: None,
                timeout: Duration::from_secs(1),
            },
            viacep_base_url: Url::parse("http://127.0.0.1:9/ws").unwrap(),
            demo_user: DemoUserConfig {
                email: "asoec".to_string(),
                password: SecretString::from("Qz7-demo-K4w"),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    fn test_app() -> Router {
        app(AppState::new(config()).unwrap())
    }

    async fn sign_in(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::post("/auth/sign-in")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::from(r#"{"email":"asoec","password":"Qz7-demo-K4w"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        let response = test_app()
            .oneshot(Request::get("/api/customers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::post("/auth/sign-in")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-forwarded-for", "203.0.113.8")
                    .body(Body::from(r#"{"email":"asoec","password":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_in_then_session() {
        let app = test_app();
        let cookie = sign_in(&app).await;

        let response = app
            .oneshot(
                Request::get("/auth/session")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "asoec");
    }

    #[tokio::test]
    async fn test_customers_without_credentials_cannot_connect() {
        let app = test_app();
        let cookie = sign_in(&app).await;

        let response = app
            .oneshot(
                Request::get("/api/customers")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], crate::view::CANNOT_CONNECT_MESSAGE);
    }
}
