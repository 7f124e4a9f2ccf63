//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients only ever see a short JSON
//! `{"error": ...}` body (plus `field`/`reason` for validation failures).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use cadastro_core::ValidationError;

use crate::celcoin::TokenError;
use crate::customers::DataAccessError;
use crate::services::AuthError;
use crate::view::CANNOT_CONNECT_MESSAGE;

/// Application-level error type for the dashboard.
#[derive(Debug, Error)]
pub enum AppError {
    /// Customer data access failed.
    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    /// No Celcoin access token could be obtained.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Sign-in failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Input failed boundary validation outside the data access layer.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::DataAccess(err) => match err {
                DataAccessError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DataAccessError::NotFound(_) => StatusCode::NOT_FOUND,
                DataAccessError::NetworkUnreachable(_)
                | DataAccessError::RemoteRejected { .. }
                | DataAccessError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Token(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Auth(AuthError::MissingCredentials) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the operator.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::DataAccess(err) => match err {
                DataAccessError::ValidationFailed(e) => e.to_string(),
                DataAccessError::NotFound(e) => e.to_string(),
                DataAccessError::NetworkUnreachable(_) => "Celcoin API unreachable".to_string(),
                DataAccessError::RemoteRejected { .. } => {
                    "Celcoin API rejected the request".to_string()
                }
                DataAccessError::InvalidResponse(_) => {
                    "Unexpected response from Celcoin API".to_string()
                }
            },
            Self::Token(_) => CANNOT_CONNECT_MESSAGE.to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Validation(err) => err.to_string(),
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
        }
    }

    const fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::DataAccess(DataAccessError::ValidationFailed(err)) | Self::Validation(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let remote_status = match &self {
                Self::DataAccess(DataAccessError::RemoteRejected { status, .. }) => Some(*status),
                _ => None,
            };
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                remote_status,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let validation = self.validation();
        let body = ErrorBody {
            error: self.public_message(),
            field: validation.map(|e| e.field.as_str()),
            reason: validation.map(|e| e.reason.as_str()),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate subsequent Sentry events with the signed-in operator.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Stop associating Sentry events with the operator (sign-out).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cadastro_core::CustomerId;

    use super::*;
    use crate::customers::StoreError;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("customer 9".to_string());
        assert_eq!(err.to_string(), "Not found: customer 9");
    }

    #[test]
    fn test_status_codes() {
        let status = |err: AppError| err.status();

        assert_eq!(
            status(DataAccessError::NotFound(StoreError::CustomerNotFound(CustomerId::new("9"))).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(
                DataAccessError::RemoteRejected {
                    status: 401,
                    body: String::new()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(DataAccessError::NetworkUnreachable("refused".to_string()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(TokenError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_names_field() {
        let err: AppError =
            DataAccessError::ValidationFailed(ValidationError::new("email", "invalid format"))
                .into();
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "email");
        assert_eq!(body["reason"], "invalid format");
    }

    #[tokio::test]
    async fn test_token_failure_says_cannot_connect() {
        let (status, body) = body_json(TokenError::Unreachable("dns".to_string()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], CANNOT_CONNECT_MESSAGE);
    }

    #[tokio::test]
    async fn test_remote_body_is_not_leaked() {
        let err: AppError = DataAccessError::RemoteRejected {
            status: 500,
            body: "stack trace from provider".to_string(),
        }
        .into();
        let (_, body) = body_json(err).await;
        assert!(!body.to_string().contains("stack trace"));
    }
}
