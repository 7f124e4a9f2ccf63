//! Write notifications raised by the data access layer.

use async_trait::async_trait;
use serde::Serialize;

use cadastro_core::{AddressId, CustomerId};

/// Which store served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Celcoin answered.
    Remote,
    /// The local fallback store answered (demo mode).
    Local,
}

impl Source {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

/// Kind of write that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    CustomerCreated,
    CustomerUpdated,
    CustomerDeleted,
    AddressAdded,
    AddressUpdated,
    AddressDeleted,
}

impl WriteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomerCreated => "customer_created",
            Self::CustomerUpdated => "customer_updated",
            Self::CustomerDeleted => "customer_deleted",
            Self::AddressAdded => "address_added",
            Self::AddressUpdated => "address_updated",
            Self::AddressDeleted => "address_deleted",
        }
    }

    /// Notice returned to the caller when the local store served the write.
    #[must_use]
    pub const fn demo_message(self) -> &'static str {
        match self {
            Self::CustomerCreated => "Customer created locally (demo mode): Celcoin API unavailable",
            Self::CustomerUpdated => "Customer updated locally (demo mode): Celcoin API unavailable",
            Self::CustomerDeleted => "Customer deleted locally (demo mode): Celcoin API unavailable",
            Self::AddressAdded => "Address added locally (demo mode): Celcoin API unavailable",
            Self::AddressUpdated => "Address updated locally (demo mode): Celcoin API unavailable",
            Self::AddressDeleted => "Address deleted locally (demo mode): Celcoin API unavailable",
        }
    }
}

/// A successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteEvent {
    pub kind: WriteKind,
    pub customer_id: CustomerId,
    pub address_id: Option<AddressId>,
    pub served_by: Source,
}

/// Receives every successful write, remote or local.
#[async_trait]
pub trait WriteListener: Send + Sync {
    async fn on_write(&self, event: &WriteEvent);
}

/// Logs each write as a structured event.
pub struct TracingListener;

#[async_trait]
impl WriteListener for TracingListener {
    async fn on_write(&self, event: &WriteEvent) {
        tracing::info!(
            kind = event.kind.as_str(),
            customer_id = %event.customer_id,
            address_id = event.address_id.as_ref().map(AddressId::as_str),
            served_by = event.served_by.as_str(),
            "customer write"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_messages_mention_demo_mode() {
        for kind in [
            WriteKind::CustomerCreated,
            WriteKind::CustomerUpdated,
            WriteKind::CustomerDeleted,
            WriteKind::AddressAdded,
            WriteKind::AddressUpdated,
            WriteKind::AddressDeleted,
        ] {
            assert!(kind.demo_message().contains("demo mode"), "{kind:?}");
        }
    }
}
