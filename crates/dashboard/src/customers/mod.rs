//! Customer data access with the demo-mode fallback policy.
//!
//! Every write is tried against Celcoin first. When no response arrives, or
//! the provider answers 404 (or 400 on create), the same write is applied to
//! the [`LocalStore`] instead and the result carries a "demo mode" message.
//! Any other provider error is returned to the caller untouched and nothing
//! is written anywhere.
//!
//! | Operation | Remote | Falls back on | Local action |
//! |---|---|---|---|
//! | create | `POST /customers` | unreachable, 400, 404 | [`LocalStore::add`] |
//! | edit | `PUT`, then `PATCH` `/customers/{id}` | unreachable, 404 (both) | [`LocalStore::update`] |
//! | delete | `DELETE /customers/{id}` | unreachable, 404 | [`LocalStore::remove`] |
//! | add address | `POST /customers/{id}/addresses` | unreachable, 404 | [`LocalStore::add_address`] |
//! | edit address | `PUT`, then `PATCH` `.../addresses/{aid}` | unreachable, 404 (both) | [`LocalStore::update_address`] |
//! | delete address | `DELETE .../addresses/{aid}` | unreachable, 404 | [`LocalStore::remove_address`] |
//!
//! Successful writes are announced to every registered [`WriteListener`];
//! the listing cache is one of them.

pub mod cache;
pub mod events;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use cadastro_core::{
    AddressId, AddressPatch, Customer, CustomerId, CustomerPatch, NewAddress, NewCustomer,
    Validate, ValidationError,
};

use crate::celcoin::{CelcoinError, CustomerApi, UpdateMethod};

pub use cache::{Listing, ListingCache};
pub use events::{Source, TracingListener, WriteEvent, WriteKind, WriteListener};
pub use store::{LocalStore, StoreError};

/// Statuses on which a create is served locally, besides "no response".
const CREATE_FALLBACK_STATUSES: &[u16] = &[400, 404];
/// Statuses on which every other operation is served locally.
const DEFAULT_FALLBACK_STATUSES: &[u16] = &[404];

// =============================================================================
// Results and errors
// =============================================================================

/// Uniform result of a write: `{ success, data, message? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub served_by: Source,
}

impl<T> Envelope<T> {
    const fn remote(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            served_by: Source::Remote,
        }
    }

    fn local(data: T, kind: WriteKind) -> Self {
        Self {
            success: true,
            data,
            message: Some(kind.demo_message().to_string()),
            served_by: Source::Local,
        }
    }

    /// Whether the local store served this result.
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.served_by == Source::Local
    }
}

/// Errors surfaced by the data access layer.
#[derive(Debug, Clone, Error)]
pub enum DataAccessError {
    /// No response from Celcoin on a path that has no fallback.
    #[error("Celcoin API unreachable: {0}")]
    NetworkUnreachable(String),

    /// Celcoin answered with a status the fallback policy does not cover.
    #[error("Celcoin rejected the request with HTTP {status}")]
    RemoteRejected { status: u16, body: String },

    /// The fallback path could not find the target record.
    #[error(transparent)]
    NotFound(#[from] StoreError),

    /// The input failed boundary validation; nothing was sent or stored.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Celcoin answered 2xx with a body of the wrong shape.
    #[error("Unexpected Celcoin response: {0}")]
    InvalidResponse(String),
}

impl From<CelcoinError> for DataAccessError {
    fn from(err: CelcoinError) -> Self {
        match err {
            CelcoinError::Unreachable(message) => Self::NetworkUnreachable(message),
            CelcoinError::Status { status, body } => Self::RemoteRejected { status, body },
            CelcoinError::Decode(message) => Self::InvalidResponse(message),
        }
    }
}

/// Whether a failed remote call should be served by the local store.
fn falls_back(err: &CelcoinError, statuses: &[u16]) -> bool {
    match err {
        CelcoinError::Unreachable(_) => true,
        CelcoinError::Status { status, .. } => statuses.contains(status),
        CelcoinError::Decode(_) => false,
    }
}

fn log_fallback(err: &CelcoinError, kind: WriteKind) {
    tracing::warn!(
        kind = kind.as_str(),
        status = err.status(),
        error = %err,
        "Celcoin unavailable, serving write from local store"
    );
}

// =============================================================================
// CustomerService
// =============================================================================

/// Data access layer for customers and their addresses.
pub struct CustomerService {
    store: Arc<LocalStore>,
    cache: ListingCache,
    listeners: Vec<Arc<dyn WriteListener>>,
}

impl CustomerService {
    /// Create a service over `store`, caching listings for `listing_ttl`.
    ///
    /// The listing cache and a tracing listener are subscribed already.
    #[must_use]
    pub fn new(store: Arc<LocalStore>, listing_ttl: Duration) -> Self {
        let cache = ListingCache::new(listing_ttl);
        Self {
            store,
            listeners: vec![Arc::new(cache.clone()), Arc::new(TracingListener)],
            cache,
        }
    }

    /// Subscribe another listener to successful writes.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn WriteListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// The local fallback store.
    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    async fn notify(
        &self,
        kind: WriteKind,
        customer_id: &CustomerId,
        address_id: Option<&AddressId>,
        served_by: Source,
    ) {
        let event = WriteEvent {
            kind,
            customer_id: customer_id.clone(),
            address_id: address_id.cloned(),
            served_by,
        };
        for listener in &self.listeners {
            listener.on_write(&event).await;
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Current customer listing.
    ///
    /// Served from the cache when warm. Otherwise Celcoin is asked; on no
    /// response or 404 the local store alone is served. When Celcoin answers,
    /// local records it does not know are appended so demo-mode writes stay
    /// visible.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `InvalidResponse` when Celcoin answers
    /// with anything else.
    #[instrument(skip(self, api))]
    pub async fn list(&self, api: &dyn CustomerApi) -> Result<Listing, DataAccessError> {
        if let Some(listing) = self.cache.get().await {
            return Ok(listing);
        }

        let generation = self.cache.generation();
        let listing = match api.list_customers().await {
            Ok(remote) => Listing {
                customers: Arc::new(merge_local(remote, self.store.list().await)),
                served_by: Source::Remote,
            },
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                tracing::warn!(error = %err, "Celcoin unavailable, listing local store");
                Listing {
                    customers: Arc::new(self.store.list().await),
                    served_by: Source::Local,
                }
            }
            Err(err) => return Err(err.into()),
        };

        if !self.cache.insert_fetched(generation, listing.clone()).await {
            tracing::debug!("listing predates a concurrent write, not cached");
        }
        Ok(listing)
    }

    /// One customer from the current listing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the listing has no such customer, or any
    /// error [`Self::list`] returns.
    pub async fn find(
        &self,
        api: &dyn CustomerApi,
        id: &CustomerId,
    ) -> Result<Customer, DataAccessError> {
        self.list(api)
            .await?
            .customers
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::CustomerNotFound(id.clone()).into())
    }

    // -------------------------------------------------------------------------
    // Customer writes
    // -------------------------------------------------------------------------

    /// Register a customer.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` before any call, or the remote error when
    /// it is not covered by the fallback policy.
    #[instrument(skip(self, api, input))]
    pub async fn create(
        &self,
        api: &dyn CustomerApi,
        input: NewCustomer,
    ) -> Result<Envelope<Customer>, DataAccessError> {
        const KIND: WriteKind = WriteKind::CustomerCreated;
        input.validate()?;

        let envelope = match api.create_customer(&input).await {
            Ok(customer) => Envelope::remote(customer),
            Err(err) if falls_back(&err, CREATE_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                Envelope::local(self.store.add(input.into()).await, KIND)
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(KIND, &envelope.data.id, None, envelope.served_by)
            .await;
        Ok(envelope)
    }

    /// Edit a customer. `PUT` is tried first, then `PATCH`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` before any call, `NotFound` when the local
    /// store does not have the customer, or an uncovered remote error.
    #[instrument(skip(self, api, patch), fields(customer_id = %id))]
    pub async fn edit(
        &self,
        api: &dyn CustomerApi,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Envelope<Customer>, DataAccessError> {
        const KIND: WriteKind = WriteKind::CustomerUpdated;
        patch.validate()?;

        let remote = match api.update_customer(id, &patch, UpdateMethod::Put).await {
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                tracing::debug!(error = %err, "PUT not accepted, retrying with PATCH");
                api.update_customer(id, &patch, UpdateMethod::Patch).await
            }
            other => other,
        };

        let envelope = match remote {
            Ok(customer) => Envelope::remote(customer),
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                Envelope::local(self.store.update(id, patch).await?, KIND)
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(KIND, id, None, envelope.served_by).await;
        Ok(envelope)
    }

    /// Delete a customer and, with it, its addresses.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the local store does not have the customer,
    /// or an uncovered remote error.
    #[instrument(skip(self, api), fields(customer_id = %id))]
    pub async fn delete(
        &self,
        api: &dyn CustomerApi,
        id: &CustomerId,
    ) -> Result<Envelope<CustomerId>, DataAccessError> {
        const KIND: WriteKind = WriteKind::CustomerDeleted;

        let envelope = match api.delete_customer(id).await {
            Ok(()) => {
                // A local copy would otherwise resurface in merged listings.
                if self.store.remove(id).await.is_ok() {
                    tracing::debug!("dropped local copy of remotely deleted customer");
                }
                Envelope::remote(id.clone())
            }
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                let removed = self.store.remove(id).await?;
                Envelope::local(removed.id, KIND)
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(KIND, id, None, envelope.served_by).await;
        Ok(envelope)
    }

    // -------------------------------------------------------------------------
    // Address writes
    // -------------------------------------------------------------------------

    /// Append an address to a customer.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` before any call, `NotFound` when the local
    /// store does not have the customer, or an uncovered remote error.
    #[instrument(skip(self, api, input), fields(customer_id = %customer_id))]
    pub async fn add_address(
        &self,
        api: &dyn CustomerApi,
        customer_id: &CustomerId,
        input: NewAddress,
    ) -> Result<Envelope<Customer>, DataAccessError> {
        const KIND: WriteKind = WriteKind::AddressAdded;
        input.validate()?;

        let envelope = match api.add_address(customer_id, &input).await {
            Ok(customer) => Envelope::remote(customer),
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                Envelope::local(self.store.add_address(customer_id, input).await?, KIND)
            }
            Err(err) => return Err(err.into()),
        };

        // The new address is the last one on the returned record.
        let address_id = envelope.data.addresses.last().map(|a| a.id.clone());
        self.notify(KIND, customer_id, address_id.as_ref(), envelope.served_by)
            .await;
        Ok(envelope)
    }

    /// Edit one address. `PUT` is tried first, then `PATCH`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` before any call, `NotFound` when the local
    /// store does not have the customer or address, or an uncovered remote
    /// error.
    #[instrument(
        skip(self, api, patch),
        fields(customer_id = %customer_id, address_id = %address_id)
    )]
    pub async fn edit_address(
        &self,
        api: &dyn CustomerApi,
        customer_id: &CustomerId,
        address_id: &AddressId,
        patch: AddressPatch,
    ) -> Result<Envelope<Customer>, DataAccessError> {
        const KIND: WriteKind = WriteKind::AddressUpdated;
        patch.validate()?;

        let remote = match api
            .update_address(customer_id, address_id, &patch, UpdateMethod::Put)
            .await
        {
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                tracing::debug!(error = %err, "PUT not accepted, retrying with PATCH");
                api.update_address(customer_id, address_id, &patch, UpdateMethod::Patch)
                    .await
            }
            other => other,
        };

        let envelope = match remote {
            Ok(customer) => Envelope::remote(customer),
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                Envelope::local(
                    self.store
                        .update_address(customer_id, address_id, patch)
                        .await?,
                    KIND,
                )
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(KIND, customer_id, Some(address_id), envelope.served_by)
            .await;
        Ok(envelope)
    }

    /// Remove one address from a customer.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the local store does not have the customer or
    /// address, or an uncovered remote error.
    #[instrument(skip(self, api), fields(customer_id = %customer_id, address_id = %address_id))]
    pub async fn delete_address(
        &self,
        api: &dyn CustomerApi,
        customer_id: &CustomerId,
        address_id: &AddressId,
    ) -> Result<Envelope<AddressId>, DataAccessError> {
        const KIND: WriteKind = WriteKind::AddressDeleted;

        let envelope = match api.delete_address(customer_id, address_id).await {
            Ok(()) => Envelope::remote(address_id.clone()),
            Err(err) if falls_back(&err, DEFAULT_FALLBACK_STATUSES) => {
                log_fallback(&err, KIND);
                let (_, removed) = self.store.remove_address(customer_id, address_id).await?;
                Envelope::local(removed.id, KIND)
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(KIND, customer_id, Some(address_id), envelope.served_by)
            .await;
        Ok(envelope)
    }
}

/// Remote records first, then local records Celcoin does not know.
fn merge_local(remote: Vec<Customer>, local: Vec<Customer>) -> Vec<Customer> {
    let known: HashSet<CustomerId> = remote.iter().map(|c| c.id.clone()).collect();
    let mut merged = remote;
    merged.extend(local.into_iter().filter(|c| !known.contains(&c.id)));
    merged
}
