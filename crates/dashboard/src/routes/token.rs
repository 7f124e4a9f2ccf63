//! Celcoin token proxy.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;

use crate::celcoin::TokenError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// POST /api/celcoin-token
///
/// `{ "access_token": ... }` on success. Failures answer `{ "error": ... }`
/// with 400 when credentials are not configured, the provider's own status
/// when it rejects the request, and 500 otherwise.
pub async fn issue(State(state): State<AppState>, RequireAuth(_user): RequireAuth) -> Response {
    match state.tokens().access_token().await {
        Ok(token) => Json(json!({ "access_token": token.expose_secret() })).into_response(),
        Err(err) => token_error_response(&err),
    }
}

fn token_error_response(err: &TokenError) -> Response {
    let (status, message) = match err {
        TokenError::NotConfigured => (
            StatusCode::BAD_REQUEST,
            "Celcoin credentials are not configured".to_string(),
        ),
        TokenError::Rejected { status, body } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            body.clone(),
        ),
        TokenError::Unreachable(_) | TokenError::InvalidResponse(_) => {
            let event_id = sentry::capture_error(err);
            tracing::error!(error = %err, sentry_event_id = %event_id, "Token proxy failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    };

    (status, Json(json!({ "error": message }))).into_response()
}
