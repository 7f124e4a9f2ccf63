//! Session-scoped dashboard table.
//!
//! Each handler locks the session's [`CustomerTableState`] in
//! [`crate::view::SessionTables`], applies one transition and answers with
//! a copy. Saves and confirmed deletions release the lock while the data
//! access operation runs, then lock again to record the outcome on the
//! table as it is by then.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_sessions::Session;

use cadastro_core::{AddressId, AddressPatch, CustomerId, CustomerPatch, NewAddress};

use crate::customers::Envelope;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::customers::settle;
use crate::state::AppState;
use crate::view::{AddressTarget, CustomerFilters, CustomerTableState, DashboardView, TableHandle};

// =============================================================================
// Table helpers
// =============================================================================

async fn table_of(state: &AppState, session: &Session) -> Result<TableHandle> {
    let Some(id) = session.id() else {
        return Err(AppError::Internal("signed-in session has no id".to_string()));
    };
    Ok(state.tables().handle(&id.to_string()).await)
}

/// Apply `change` under the session's lock and answer with the result.
async fn transition(
    state: &AppState,
    session: &Session,
    change: impl FnOnce(&mut CustomerTableState) -> Result<()>,
) -> Result<Json<TableResponse>> {
    let handle = table_of(state, session).await?;
    let mut table = handle.lock().await;
    change(&mut table)?;
    Ok(Json(TableResponse::new(table.clone())))
}

/// Table state after a transition, with the demo-mode notice if the write
/// behind it was served locally.
#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub table: CustomerTableState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TableResponse {
    const fn new(table: CustomerTableState) -> Self {
        Self {
            table,
            message: None,
        }
    }

    fn after<T>(table: CustomerTableState, envelope: &Envelope<T>) -> Self {
        Self {
            table,
            message: envelope.message.clone(),
        }
    }
}

// =============================================================================
// View
// =============================================================================

/// GET /api/table
///
/// Rows under the session's filters, or `503 {"status": "unavailable"}`
/// when no access token can be obtained.
///
/// # Errors
///
/// 502 when Celcoin fails outside the fallback policy.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Response> {
    let api = match state.celcoin().await {
        Ok(api) => api,
        Err(err) => {
            tracing::warn!(error = %err, "no Celcoin token for dashboard view");
            return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(DashboardView::unavailable()))
                .into_response());
        }
    };

    let listing = settle(&state, state.customers().list(&api).await).await?;
    let handle = table_of(&state, &session).await?;
    let table = handle.lock().await.clone();
    Ok(Json(DashboardView::ready(&listing, table)).into_response())
}

/// PUT /api/table/filters
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn set_filters(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Json(filters): Json<CustomerFilters>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.filters = filters;
        Ok(())
    })
    .await
}

/// POST /api/table/expanded/{id}
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn toggle_expanded(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path(id): Path<CustomerId>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.toggle_expanded(&id);
        Ok(())
    })
    .await
}

// =============================================================================
// Customer edit
// =============================================================================

/// POST /api/table/customers/{id}/edit
///
/// # Errors
///
/// 404 when the listing has no such customer, 503 without a token.
pub async fn begin_customer_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path(id): Path<CustomerId>,
) -> Result<Json<TableResponse>> {
    let api = state.celcoin().await?;
    let customer = settle(&state, state.customers().find(&api, &id).await).await?;

    transition(&state, &session, |table| {
        table.begin_customer_edit(&customer);
        Ok(())
    })
    .await
}

/// PATCH /api/table/customer-edit
///
/// # Errors
///
/// 400 when no customer edit is open.
pub async fn update_customer_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        if table.customer_edit.update(|buffer| buffer.merge(patch)) {
            Ok(())
        } else {
            Err(AppError::BadRequest("No customer edit in progress".to_string()))
        }
    })
    .await
}

/// POST /api/table/customer-edit/save
///
/// Submits the fields changed since the edit began. On failure the edit is
/// reopened with the error and the buffer intact, then the error is
/// returned.
///
/// # Errors
///
/// 400 when no customer edit is open, or the error of the edit itself.
pub async fn save_customer_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    let handle = table_of(&state, &session).await?;
    let begun = handle.lock().await.customer_edit.begin_save();
    let Some((id, patch)) = begun else {
        return Err(AppError::BadRequest("No customer edit in progress".to_string()));
    };

    let outcome = match state.celcoin().await {
        Ok(api) => settle(&state, state.customers().edit(&api, &id, patch).await).await,
        Err(err) => Err(err.into()),
    };

    let table = {
        let mut table = handle.lock().await;
        table
            .customer_edit
            .finish_save(&id, outcome.as_ref().map(|_| ()).map_err(AppError::public_message));
        table.clone()
    };

    let envelope = outcome?;
    Ok(Json(TableResponse::after(table, &envelope)))
}

/// POST /api/table/customer-edit/cancel
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn cancel_customer_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.customer_edit.cancel();
        Ok(())
    })
    .await
}

// =============================================================================
// Address edit
// =============================================================================

/// POST /api/table/customers/{id}/addresses/{address_id}/edit
///
/// # Errors
///
/// 404 when the customer or address is unknown, 503 without a token.
pub async fn begin_address_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path((id, address_id)): Path<(CustomerId, AddressId)>,
) -> Result<Json<TableResponse>> {
    let api = state.celcoin().await?;
    let customer = settle(&state, state.customers().find(&api, &id).await).await?;

    transition(&state, &session, |table| {
        if table.begin_address_edit(&customer, &address_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "address {address_id} not found on customer {id}"
            )))
        }
    })
    .await
}

/// PATCH /api/table/address-edit
///
/// # Errors
///
/// 400 when no address edit is open.
pub async fn update_address_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        if table.address_edit.update(|buffer| buffer.merge(patch)) {
            Ok(())
        } else {
            Err(AppError::BadRequest("No address edit in progress".to_string()))
        }
    })
    .await
}

/// POST /api/table/address-edit/save
///
/// # Errors
///
/// 400 when no address edit is open, or the error of the edit itself.
pub async fn save_address_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    let handle = table_of(&state, &session).await?;
    let begun = handle.lock().await.address_edit.begin_save();
    let Some((target, patch)) = begun else {
        return Err(AppError::BadRequest("No address edit in progress".to_string()));
    };

    let outcome = match state.celcoin().await {
        Ok(api) => {
            let result = state
                .customers()
                .edit_address(&api, &target.customer_id, &target.address_id, patch)
                .await;
            settle(&state, result).await
        }
        Err(err) => Err(err.into()),
    };

    let table = {
        let mut table = handle.lock().await;
        table
            .address_edit
            .finish_save(&target, outcome.as_ref().map(|_| ()).map_err(AppError::public_message));
        table.clone()
    };

    let envelope = outcome?;
    Ok(Json(TableResponse::after(table, &envelope)))
}

/// POST /api/table/address-edit/cancel
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn cancel_address_edit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.address_edit.cancel();
        Ok(())
    })
    .await
}

// =============================================================================
// New address
// =============================================================================

/// POST /api/table/customers/{id}/new-address
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn begin_new_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path(id): Path<CustomerId>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.begin_new_address(id);
        Ok(())
    })
    .await
}

/// PATCH /api/table/new-address
///
/// Also used to apply a CEP suggestion to the draft.
///
/// # Errors
///
/// 400 when no draft is open.
pub async fn update_new_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        if table.new_address.update(|draft| draft.merge(patch)) {
            Ok(())
        } else {
            Err(AppError::BadRequest("No new address in progress".to_string()))
        }
    })
    .await
}

/// POST /api/table/new-address/save
///
/// # Errors
///
/// 400 when no draft is open, or the error of the write itself.
pub async fn save_new_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    let handle = table_of(&state, &session).await?;
    let begun = handle.lock().await.new_address.begin_save();
    let Some((customer_id, draft)) = begun else {
        return Err(AppError::BadRequest("No new address in progress".to_string()));
    };

    let outcome = match state.celcoin().await {
        Ok(api) => {
            let result = state
                .customers()
                .add_address(&api, &customer_id, NewAddress::from(draft))
                .await;
            settle(&state, result).await
        }
        Err(err) => Err(err.into()),
    };

    let table = {
        let mut table = handle.lock().await;
        table
            .new_address
            .finish_save(&customer_id, outcome.as_ref().map(|_| ()).map_err(AppError::public_message));
        table.clone()
    };

    let envelope = outcome?;
    Ok(Json(TableResponse::after(table, &envelope)))
}

/// POST /api/table/new-address/cancel
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn cancel_new_address(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.new_address.cancel();
        Ok(())
    })
    .await
}

// =============================================================================
// Deletions
// =============================================================================

/// POST /api/table/customers/{id}/delete
///
/// Marks the customer for deletion; nothing is deleted yet.
///
/// # Errors
///
/// 404 when the listing has no such customer, 503 without a token.
pub async fn request_customer_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path(id): Path<CustomerId>,
) -> Result<Json<TableResponse>> {
    let api = state.celcoin().await?;
    let customer = settle(&state, state.customers().find(&api, &id).await).await?;

    transition(&state, &session, |table| {
        table.request_customer_deletion(&customer);
        Ok(())
    })
    .await
}

/// POST /api/table/customer-deletion/confirm
///
/// # Errors
///
/// 400 when nothing is pending, or the error of the deletion itself. The
/// marker is cleared either way.
pub async fn confirm_customer_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    let handle = table_of(&state, &session).await?;
    let pending = handle.lock().await.confirm_customer_deletion();
    let Some(pending) = pending else {
        return Err(AppError::BadRequest("No customer deletion pending".to_string()));
    };

    let api = state.celcoin().await?;
    let envelope = settle(&state, state.customers().delete(&api, &pending.target).await).await?;

    let table = {
        let mut table = handle.lock().await;
        table.forget_customer(&pending.target);
        table.clone()
    };
    Ok(Json(TableResponse::after(table, &envelope)))
}

/// POST /api/table/customer-deletion/cancel
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn cancel_customer_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.cancel_customer_deletion();
        Ok(())
    })
    .await
}

/// POST /api/table/customers/{id}/addresses/{address_id}/delete
///
/// # Errors
///
/// 404 when the customer or address is unknown, 503 without a token.
pub async fn request_address_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
    Path((id, address_id)): Path<(CustomerId, AddressId)>,
) -> Result<Json<TableResponse>> {
    let api = state.celcoin().await?;
    let customer = settle(&state, state.customers().find(&api, &id).await).await?;

    transition(&state, &session, |table| {
        if table.request_address_deletion(&customer, &address_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "address {address_id} not found on customer {id}"
            )))
        }
    })
    .await
}

/// POST /api/table/address-deletion/confirm
///
/// # Errors
///
/// 400 when nothing is pending, or the error of the deletion itself.
pub async fn confirm_address_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    let handle = table_of(&state, &session).await?;
    let pending = handle.lock().await.confirm_address_deletion();
    let Some(pending) = pending else {
        return Err(AppError::BadRequest("No address deletion pending".to_string()));
    };

    let AddressTarget {
        customer_id,
        address_id,
    } = &pending.target;
    let api = state.celcoin().await?;
    let result = state
        .customers()
        .delete_address(&api, customer_id, address_id)
        .await;
    let envelope = settle(&state, result).await?;

    let table = {
        let mut table = handle.lock().await;
        table.forget_address(&pending.target);
        table.clone()
    };
    Ok(Json(TableResponse::after(table, &envelope)))
}

/// POST /api/table/address-deletion/cancel
///
/// # Errors
///
/// 500 if the session has no id.
pub async fn cancel_address_deletion(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Json<TableResponse>> {
    transition(&state, &session, |table| {
        table.cancel_address_deletion();
        Ok(())
    })
    .await
}
