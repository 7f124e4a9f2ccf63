//! Sign-in, sign-out and session inspection.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Sign-in form.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Who is signed in, if anyone.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<CurrentUser>,
}

/// POST /auth/sign-in
///
/// # Errors
///
/// 400 on blank fields, 401 on wrong credentials.
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInRequest>,
) -> Result<Json<SessionResponse>> {
    let user = state.auth().authenticate(&form.email, &form.password)?;
    set_current_user(&session, &user).await?;
    set_sentry_user(&user.email);

    tracing::info!(email = %user.email, "operator signed in");
    Ok(Json(SessionResponse { user: Some(user) }))
}

/// POST /auth/sign-out
///
/// Also drops the session's dashboard table.
///
/// # Errors
///
/// 500 if the session store fails.
pub async fn sign_out(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    if let Some(id) = session.id() {
        state.tables().remove(&id.to_string()).await;
    }
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session
pub async fn current(OptionalAuth(user): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}
