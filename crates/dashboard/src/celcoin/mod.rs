//! Celcoin (CEL Payments) REST API integration.
//!
//! # Architecture
//!
//! - [`TokenProvider`] exchanges the configured client credentials for an
//!   access token and caches it until shortly before expiry
//! - [`CelcoinClient`] is built per request from a token; it carries no
//!   state of its own, performs no retries and caches nothing
//! - [`CustomerApi`] is the seam the data access layer talks to, so the
//!   fallback policy can be exercised against fakes

pub mod client;
pub mod token;

pub use client::CelcoinClient;
pub use token::{TokenError, TokenProvider};

use async_trait::async_trait;
use cadastro_core::{AddressId, AddressPatch, Customer, CustomerId, CustomerPatch, NewAddress, NewCustomer};
use thiserror::Error;

/// Errors returned by the Celcoin customer endpoints.
#[derive(Debug, Clone, Error)]
pub enum CelcoinError {
    /// No response was received (connect failure, timeout, broken body).
    #[error("Celcoin unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with a non-success status.
    #[error("Celcoin returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A success response whose body is not the expected shape.
    #[error("Unexpected Celcoin response: {0}")]
    Decode(String),
}

impl CelcoinError {
    /// HTTP status code, when the provider answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unreachable(_) | Self::Decode(_) => None,
        }
    }

    /// Whether no response was received.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// HTTP verb used for an update.
///
/// The provider accepts edits through `PUT` on some routes and only `PATCH`
/// on others, so callers try one and then the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Put,
    Patch,
}

impl UpdateMethod {
    /// Wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

/// Customer operations exposed by the provider.
#[async_trait]
pub trait CustomerApi: Send + Sync {
    /// `GET /customers`
    async fn list_customers(&self) -> Result<Vec<Customer>, CelcoinError>;

    /// `POST /customers`
    async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, CelcoinError>;

    /// `PUT|PATCH /customers/{id}`
    async fn update_customer(
        &self,
        id: &CustomerId,
        patch: &CustomerPatch,
        method: UpdateMethod,
    ) -> Result<Customer, CelcoinError>;

    /// `DELETE /customers/{id}`
    async fn delete_customer(&self, id: &CustomerId) -> Result<(), CelcoinError>;

    /// `POST /customers/{id}/addresses`
    async fn add_address(
        &self,
        customer_id: &CustomerId,
        input: &NewAddress,
    ) -> Result<Customer, CelcoinError>;

    /// `PUT|PATCH /customers/{id}/addresses/{addressId}`
    async fn update_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
        patch: &AddressPatch,
        method: UpdateMethod,
    ) -> Result<Customer, CelcoinError>;

    /// `DELETE /customers/{id}/addresses/{addressId}`
    async fn delete_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
    ) -> Result<(), CelcoinError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celcoin_error_display() {
        let err = CelcoinError::Status {
            status: 422,
            body: "{}".to_string(),
        };
        assert_eq!(err.to_string(), "Celcoin returned HTTP 422");
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_unreachable());

        let err = CelcoinError::Unreachable("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert!(err.is_unreachable());
    }
}
