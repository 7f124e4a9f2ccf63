//! HTTP route handlers for the dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                   - Liveness check
//!
//! # Auth
//! POST   /auth/sign-in                             - Demo credential check (rate limited)
//! POST   /auth/sign-out                            - End the session
//! GET    /auth/session                             - Current operator, if any
//!
//! # API (requires a signed-in session)
//! POST   /api/celcoin-token                        - Token proxy (rate limited)
//! GET    /api/customers                            - Filtered listing
//! POST   /api/customers                            - Create
//! PUT    /api/customers/{id}                       - Edit
//! DELETE /api/customers/{id}                       - Delete
//! POST   /api/customers/{id}/addresses             - Add address
//! PUT    /api/customers/{id}/addresses/{aid}       - Edit address
//! DELETE /api/customers/{id}/addresses/{aid}       - Delete address
//! GET    /api/cep/{cep}                            - Postal code autofill
//!
//! # Table state (requires a signed-in session)
//! GET    /api/table                                - Dashboard view
//! PUT    /api/table/filters                        - Set filters
//! POST   /api/table/expanded/{id}                  - Toggle row
//! POST   /api/table/customers/{id}/edit            - Open customer edit
//! PATCH  /api/table/customer-edit                  - Change edit buffer
//! POST   /api/table/customer-edit/save             - Save
//! POST   /api/table/customer-edit/cancel           - Cancel
//! POST   /api/table/customers/{id}/addresses/{aid}/edit   - Open address edit
//! PATCH  /api/table/address-edit                   - Change address buffer
//! POST   /api/table/address-edit/save              - Save
//! POST   /api/table/address-edit/cancel            - Cancel
//! POST   /api/table/customers/{id}/new-address     - Open add-address draft
//! PATCH  /api/table/new-address                    - Change draft
//! POST   /api/table/new-address/save               - Save
//! POST   /api/table/new-address/cancel             - Cancel
//! POST   /api/table/customers/{id}/delete          - Request customer deletion
//! POST   /api/table/customer-deletion/confirm      - Confirm
//! POST   /api/table/customer-deletion/cancel       - Cancel
//! POST   /api/table/customers/{id}/addresses/{aid}/delete - Request address deletion
//! POST   /api/table/address-deletion/confirm       - Confirm
//! POST   /api/table/address-deletion/cancel        - Cancel
//! ```

pub mod auth;
pub mod cep;
pub mod customers;
pub mod table;
pub mod token;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check Celcoin.
pub async fn health() -> &'static str {
    "ok"
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-in", post(auth::sign_in))
        .layer(auth_rate_limiter())
        .route("/sign-out", post(auth::sign_out))
        .route("/session", get(auth::current))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index).post(customers::create))
        .route("/{id}", put(customers::update).delete(customers::delete))
        .route("/{id}/addresses", post(customers::create_address))
        .route(
            "/{id}/addresses/{address_id}",
            put(customers::update_address).delete(customers::delete_address),
        )
}

/// Create the table-state routes router.
pub fn table_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(table::show))
        .route("/filters", put(table::set_filters))
        .route("/expanded/{id}", post(table::toggle_expanded))
        // Customer edit
        .route("/customers/{id}/edit", post(table::begin_customer_edit))
        .route("/customer-edit", patch(table::update_customer_edit))
        .route("/customer-edit/save", post(table::save_customer_edit))
        .route("/customer-edit/cancel", post(table::cancel_customer_edit))
        // Address edit
        .route(
            "/customers/{id}/addresses/{address_id}/edit",
            post(table::begin_address_edit),
        )
        .route("/address-edit", patch(table::update_address_edit))
        .route("/address-edit/save", post(table::save_address_edit))
        .route("/address-edit/cancel", post(table::cancel_address_edit))
        // New address
        .route("/customers/{id}/new-address", post(table::begin_new_address))
        .route("/new-address", patch(table::update_new_address))
        .route("/new-address/save", post(table::save_new_address))
        .route("/new-address/cancel", post(table::cancel_new_address))
        // Deletions
        .route("/customers/{id}/delete", post(table::request_customer_deletion))
        .route(
            "/customer-deletion/confirm",
            post(table::confirm_customer_deletion),
        )
        .route(
            "/customer-deletion/cancel",
            post(table::cancel_customer_deletion),
        )
        .route(
            "/customers/{id}/addresses/{address_id}/delete",
            post(table::request_address_deletion),
        )
        .route(
            "/address-deletion/confirm",
            post(table::confirm_address_deletion),
        )
        .route(
            "/address-deletion/cancel",
            post(table::cancel_address_deletion),
        )
}

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/celcoin-token", post(token::issue))
        .layer(auth_rate_limiter())
        .nest("/customers", customer_routes())
        .route("/cep/{cep}", get(cep::lookup))
        .nest("/table", table_routes())
}

/// Create all routes for the dashboard.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}
