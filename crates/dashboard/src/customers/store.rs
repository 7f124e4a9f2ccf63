//! In-memory customer store used when Celcoin cannot serve a write.
//!
//! The store keeps records in insertion order and resets when the process
//! restarts. Each operation takes the write lock once and holds it for the
//! whole mutation, so no caller ever observes a half-applied change.

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;

use cadastro_core::{
    Address, AddressId, AddressPatch, Customer, CustomerId, CustomerPatch, CustomerStatus,
    NewAddress,
};

/// Lookup failures raised by the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),
    #[error("address {address_id} not found on customer {customer_id}")]
    AddressNotFound {
        customer_id: CustomerId,
        address_id: AddressId,
    },
}

/// Source of "now" for timestamps and ids.
pub type Clock = fn() -> DateTime<Utc>;

/// Ordered, process-local customer collection.
pub struct LocalStore {
    inner: RwLock<Inner>,
    clock: Clock,
}

struct Inner {
    customers: Vec<Customer>,
    ids: IdMinter,
}

/// Hands out decimal nanosecond timestamps, strictly increasing.
struct IdMinter {
    last: i64,
}

impl IdMinter {
    /// The current time in nanoseconds, bumped past the previous id so two
    /// calls within the same clock tick still differ.
    fn next(&mut self, now: DateTime<Utc>) -> String {
        let nanos = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let next = nanos.max(self.last.saturating_add(1));
        self.last = next;
        next.to_string()
    }
}

fn find_mut<'a>(
    customers: &'a mut [Customer],
    id: &CustomerId,
) -> Result<&'a mut Customer, StoreError> {
    customers
        .iter_mut()
        .find(|c| &c.id == id)
        .ok_or_else(|| StoreError::CustomerNotFound(id.clone()))
}

impl LocalStore {
    /// Create a store holding `initial`, in order.
    #[must_use]
    pub fn new(initial: Vec<Customer>) -> Self {
        Self::with_clock(initial, Utc::now)
    }

    /// Create a store with an explicit clock.
    #[must_use]
    pub fn with_clock(initial: Vec<Customer>, clock: Clock) -> Self {
        Self {
            inner: RwLock::new(Inner {
                customers: initial,
                ids: IdMinter { last: 0 },
            }),
            clock,
        }
    }

    /// Create a store with the two demo customers.
    #[must_use]
    pub fn seeded() -> Self {
        Self::new(seed_customers())
    }

    /// Snapshot of every record. Mutating the result does not touch the store.
    pub async fn list(&self) -> Vec<Customer> {
        self.inner.read().await.customers.clone()
    }

    /// Copy of one record.
    pub async fn get(&self, id: &CustomerId) -> Option<Customer> {
        self.inner
            .read()
            .await
            .customers
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    /// Insert a record built from `partial`.
    ///
    /// Omitted fields become empty, the status is always `active`, and both
    /// timestamps are set to now.
    pub async fn add(&self, partial: CustomerPatch) -> Customer {
        let now = (self.clock)();
        let mut inner = self.inner.write().await;
        let Inner { customers, ids } = &mut *inner;

        let id = CustomerId::new(ids.next(now));
        let mut customer = Customer {
            id,
            name: String::new(),
            document: String::new(),
            email: String::new(),
            phone: String::new(),
            status: CustomerStatus::Active,
            addresses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        customer.apply(
            CustomerPatch {
                status: None,
                ..partial
            },
            || AddressId::new(ids.next(now)),
        );

        customers.push(customer.clone());
        customer
    }

    /// Merge `partial` over an existing record and restamp it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CustomerNotFound` if `id` is absent.
    pub async fn update(
        &self,
        id: &CustomerId,
        partial: CustomerPatch,
    ) -> Result<Customer, StoreError> {
        let now = (self.clock)();
        let mut inner = self.inner.write().await;

        let Inner { customers, ids } = &mut *inner;

        let customer = find_mut(customers, id)?;
        customer.apply(partial, || AddressId::new(ids.next(now)));
        customer.touch(now);
        Ok(customer.clone())
    }

    /// Delete a record and return it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CustomerNotFound` if `id` is absent.
    pub async fn remove(&self, id: &CustomerId) -> Result<Customer, StoreError> {
        let mut inner = self.inner.write().await;
        let index = inner
            .customers
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| StoreError::CustomerNotFound(id.clone()))?;
        Ok(inner.customers.remove(index))
    }

    /// Append an address to a customer and restamp the customer.
    ///
    /// An id supplied with the input is kept unless the customer already has
    /// an address with that id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CustomerNotFound` if `customer_id` is absent.
    pub async fn add_address(
        &self,
        customer_id: &CustomerId,
        input: NewAddress,
    ) -> Result<Customer, StoreError> {
        let now = (self.clock)();
        let mut inner = self.inner.write().await;
        let Inner { customers, ids } = &mut *inner;

        let customer = find_mut(customers, customer_id)?;
        let id = match input.id.clone() {
            Some(id) if customer.address(&id).is_none() => id,
            _ => AddressId::new(ids.next(now)),
        };
        customer.addresses.push(input.into_address(id));
        customer.touch(now);
        Ok(customer.clone())
    }

    /// Merge `partial` over one address and restamp the parent customer.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the customer or the address is absent.
    pub async fn update_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
        partial: AddressPatch,
    ) -> Result<Customer, StoreError> {
        let now = (self.clock)();
        let mut inner = self.inner.write().await;

        let customer = find_mut(&mut inner.customers, customer_id)?;
        let address: &mut Address =
            customer
                .address_mut(address_id)
                .ok_or_else(|| StoreError::AddressNotFound {
                    customer_id: customer_id.clone(),
                    address_id: address_id.clone(),
                })?;
        partial.apply_to(address);
        customer.touch(now);
        Ok(customer.clone())
    }

    /// Remove one address and restamp the parent customer.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the customer or the address is absent.
    pub async fn remove_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
    ) -> Result<(Customer, Address), StoreError> {
        let now = (self.clock)();
        let mut inner = self.inner.write().await;

        let customer = find_mut(&mut inner.customers, customer_id)?;
        let index = customer
            .addresses
            .iter()
            .position(|a| &a.id == address_id)
            .ok_or_else(|| StoreError::AddressNotFound {
                customer_id: customer_id.clone(),
                address_id: address_id.clone(),
            })?;
        let removed = customer.addresses.remove(index);
        customer.touch(now);
        Ok((customer.clone(), removed))
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::seeded()
    }
}

/// The demo dataset served before any write happens.
#[must_use]
pub fn seed_customers() -> Vec<Customer> {
    let seed = |id: &str, name: &str, document: &str, email: &str, status, at: DateTime<Utc>| {
        Customer {
            id: CustomerId::new(id),
            name: name.to_string(),
            document: document.to_string(),
            email: email.to_string(),
            phone: String::new(),
            status,
            addresses: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    };

    vec![
        seed(
            "1",
            "João Silva",
            "12345678901",
            "joao@exemplo.com",
            CustomerStatus::Active,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
                .single()
                .unwrap_or_default(),
        ),
        seed(
            "2",
            "Maria Santos",
            "98765432100",
            "maria@exemplo.com",
            CustomerStatus::Inactive,
            Utc.with_ymd_and_hms(2024, 1, 16, 14, 20, 0)
                .single()
                .unwrap_or_default(),
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn address(street: &str, zipcode: &str) -> NewAddress {
        NewAddress {
            id: None,
            street: street.to_string(),
            number: "1".to_string(),
            neighborhood: "N".to_string(),
            city: "C".to_string(),
            state: "SP".to_string(),
            zipcode: zipcode.to_string(),
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_seeded_store_has_demo_customers() {
        let store = LocalStore::seeded();
        let names: Vec<String> = store.list().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["João Silva", "Maria Santos"]);
    }

    #[tokio::test]
    async fn test_list_returns_a_snapshot() {
        let store = LocalStore::seeded();
        let mut snapshot = store.list().await;
        snapshot[0].name = "Changed".to_string();
        snapshot.clear();

        assert_eq!(store.list().await.len(), 2);
        assert_eq!(store.list().await[0].name, "João Silva");
    }

    #[tokio::test]
    async fn test_add_fills_defaults_and_forces_active() {
        let store = LocalStore::new(Vec::new());
        let created = store
            .add(CustomerPatch {
                name: Some("Ana".to_string()),
                status: Some(CustomerStatus::Inactive),
                ..CustomerPatch::default()
            })
            .await;

        assert_eq!(created.name, "Ana");
        assert_eq!(created.status, CustomerStatus::Active);
        assert!(created.email.is_empty());
        assert!(created.addresses.is_empty());
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(store.get(&created.id).await, Some(created));
    }

    #[tokio::test]
    async fn test_ids_are_unique_under_a_frozen_clock() {
        let store = LocalStore::with_clock(Vec::new(), fixed_clock);
        let mut ids = HashSet::new();
        for _ in 0..50 {
            let created = store
                .add(CustomerPatch {
                    addresses: Some(vec![address("Rua X", "00000-000"), address("Rua Y", "11111-111")]),
                    ..CustomerPatch::default()
                })
                .await;
            assert!(ids.insert(created.id.clone()));
            assert_ne!(created.addresses[0].id, created.addresses[1].id);
        }
        assert_eq!(store.list().await.len(), 50);
    }

    #[tokio::test]
    async fn test_update_replaces_addresses_and_restamps() {
        let store = LocalStore::new(Vec::new());
        let created = store
            .add(CustomerPatch {
                name: Some("Ana".to_string()),
                addresses: Some(vec![address("Rua X", "00000-000")]),
                ..CustomerPatch::default()
            })
            .await;

        let updated = store
            .update(
                &created.id,
                CustomerPatch {
                    email: Some("ana@exemplo.com".to_string()),
                    addresses: Some(vec![]),
                    ..CustomerPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.email, "ana@exemplo.com");
        assert!(updated.addresses.is_empty());
        assert!(updated.updated_at >= created.updated_at);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_restamp_never_goes_backwards() {
        // Seed records are in 2024; a clock stuck in 2020 must not rewind them.
        fn past() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        }
        let store = LocalStore::with_clock(seed_customers(), past);
        let before = store.get(&CustomerId::new("1")).await.unwrap();

        let after = store
            .update(&CustomerId::new("1"), CustomerPatch::default())
            .await
            .unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_missing_ids_are_reported() {
        let store = LocalStore::seeded();
        let missing = CustomerId::new("999");

        assert_eq!(
            store.update(&missing, CustomerPatch::default()).await,
            Err(StoreError::CustomerNotFound(missing.clone()))
        );
        assert!(store.remove(&missing).await.is_err());
        assert!(store
            .remove_address(&CustomerId::new("1"), &AddressId::new("nope"))
            .await
            .is_err());
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_returns_record() {
        let store = LocalStore::seeded();
        let removed = store.remove(&CustomerId::new("2")).await.unwrap();
        assert_eq!(removed.name, "Maria Santos");
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_address_edit_touches_only_target() {
        let store = LocalStore::new(Vec::new());
        let created = store
            .add(CustomerPatch {
                addresses: Some(vec![address("Rua X", "00000-000"), address("Rua Y", "11111-111")]),
                ..CustomerPatch::default()
            })
            .await;
        let second = created.addresses[1].id.clone();

        let updated = store
            .update_address(
                &created.id,
                &second,
                AddressPatch {
                    zipcode: Some("22222-222".to_string()),
                    ..AddressPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.addresses[0], created.addresses[0]);
        assert_eq!(updated.addresses[1].zipcode, "22222-222");
        assert_eq!(updated.addresses[1].street, "Rua Y");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_add_and_remove_address() {
        let store = LocalStore::seeded();
        let id = CustomerId::new("1");

        let with_address = store
            .add_address(&id, address("Rua Z", "33333-333"))
            .await
            .unwrap();
        assert_eq!(with_address.addresses.len(), 1);
        let address_id = with_address.addresses[0].id.clone();

        let (customer, removed) = store.remove_address(&id, &address_id).await.unwrap();
        assert_eq!(removed.street, "Rua Z");
        assert!(customer.addresses.is_empty());
    }

    #[tokio::test]
    async fn test_add_address_rejects_duplicate_id() {
        let store = LocalStore::seeded();
        let id = CustomerId::new("1");
        let mut input = address("Rua A", "00000-000");
        input.id = Some(AddressId::new("a1"));

        store.add_address(&id, input.clone()).await.unwrap();
        let customer = store.add_address(&id, input).await.unwrap();

        assert_eq!(customer.addresses[0].id.as_str(), "a1");
        assert_ne!(customer.addresses[1].id.as_str(), "a1");
    }
}
