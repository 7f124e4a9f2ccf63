//! Postal code autofill.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::cep::AddressSuggestion;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// GET /api/cep/{cep}
///
/// `null` when ViaCEP does not know the CEP or cannot be reached.
///
/// # Errors
///
/// 422 when the CEP does not have 8 digits.
pub async fn lookup(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(cep): Path<String>,
) -> Result<Json<Option<AddressSuggestion>>> {
    Ok(Json(state.cep().lookup(&cep).await?))
}
