//! Customer and address JSON API.
//!
//! Every handler first obtains a Celcoin client; when no access token can
//! be had the request fails with 503 and nothing is read from or written
//! to the fallback store.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

use cadastro_core::{
    AddressId, AddressPatch, Customer, CustomerId, CustomerPatch, NewAddress, NewCustomer,
};

use crate::customers::{DataAccessError, Envelope, Source};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::view::CustomerFilters;

/// Convert a data access result, dropping the cached token when Celcoin
/// rejected it.
pub(crate) async fn settle<T>(
    state: &AppState,
    result: std::result::Result<T, DataAccessError>,
) -> Result<T> {
    if let Err(DataAccessError::RemoteRejected { status: 401, .. }) = &result {
        tracing::warn!("Celcoin rejected the access token, dropping it");
        state.tokens().invalidate().await;
    }
    result.map_err(AppError::from)
}

/// Filtered customer listing.
#[derive(Debug, Serialize)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
    /// Row count before filtering.
    pub total: usize,
    pub demo_mode: bool,
}

/// GET /api/customers?id=&name=&document=&email=
///
/// # Errors
///
/// 503 without a token, 502 when Celcoin fails outside the fallback policy.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(filters): Query<CustomerFilters>,
) -> Result<Json<CustomerList>> {
    let api = state.celcoin().await?;
    let listing = settle(&state, state.customers().list(&api).await).await?;

    Ok(Json(CustomerList {
        customers: filters.apply(&listing.customers),
        total: listing.customers.len(),
        demo_mode: listing.served_by == Source::Local,
    }))
}

/// POST /api/customers
///
/// # Errors
///
/// 422 on invalid input, 503 without a token, 502 on uncovered Celcoin errors.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Envelope<Customer>>)> {
    let api = state.celcoin().await?;
    let envelope = settle(&state, state.customers().create(&api, input).await).await?;
    Ok((StatusCode::CREATED, Json(envelope)))
}

/// PUT /api/customers/{id}
///
/// # Errors
///
/// 422 on invalid input, 404 when the fallback store lacks the customer.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<CustomerId>,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<Envelope<Customer>>> {
    let api = state.celcoin().await?;
    let envelope = settle(&state, state.customers().edit(&api, &id, patch).await).await?;
    Ok(Json(envelope))
}

/// DELETE /api/customers/{id}
///
/// # Errors
///
/// 404 when the fallback store lacks the customer.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<CustomerId>,
) -> Result<Json<Envelope<CustomerId>>> {
    let api = state.celcoin().await?;
    let envelope = settle(&state, state.customers().delete(&api, &id).await).await?;
    Ok(Json(envelope))
}

/// POST /api/customers/{id}/addresses
///
/// # Errors
///
/// 422 on invalid input, 404 when the fallback store lacks the customer.
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<CustomerId>,
    Json(input): Json<NewAddress>,
) -> Result<(StatusCode, Json<Envelope<Customer>>)> {
    let api = state.celcoin().await?;
    let envelope = settle(&state, state.customers().add_address(&api, &id, input).await).await?;
    Ok((StatusCode::CREATED, Json(envelope)))
}

/// PUT /api/customers/{id}/addresses/{address_id}
///
/// # Errors
///
/// 422 on invalid input, 404 when the fallback store lacks the address.
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path((id, address_id)): Path<(CustomerId, AddressId)>,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<Envelope<Customer>>> {
    let api = state.celcoin().await?;
    let result = state
        .customers()
        .edit_address(&api, &id, &address_id, patch)
        .await;
    Ok(Json(settle(&state, result).await?))
}

/// DELETE /api/customers/{id}/addresses/{address_id}
///
/// # Errors
///
/// 404 when the fallback store lacks the address.
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path((id, address_id)): Path<(CustomerId, AddressId)>,
) -> Result<Json<Envelope<AddressId>>> {
    let api = state.celcoin().await?;
    let result = state
        .customers()
        .delete_address(&api, &id, &address_id)
        .await;
    Ok(Json(settle(&state, result).await?))
}
