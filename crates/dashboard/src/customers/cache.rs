//! Cached customer listing.
//!
//! Holds the merged listing for a configurable TTL and drops it on every
//! successful write, so a write is always visible to the next read.
//!
//! A listing fetched while a write was completing may predate that write.
//! Callers take a [`ListingCache::generation`] before fetching and hand it
//! back to [`ListingCache::insert_fetched`], which refuses to keep a
//! listing once any write has been announced since.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use cadastro_core::Customer;

use super::events::{Source, WriteEvent, WriteListener};

const LISTING_KEY: &str = "customers";

/// A listing and where it came from.
#[derive(Debug, Clone)]
pub struct Listing {
    pub customers: Arc<Vec<Customer>>,
    pub served_by: Source,
}

/// Single-entry `moka` cache for the customer listing.
#[derive(Clone)]
pub struct ListingCache {
    cache: Cache<&'static str, Listing>,
    /// Bumped on every write, before the entry is dropped.
    writes: Arc<AtomicU64>,
}

impl ListingCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Write generation to pass to [`Self::insert_fetched`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    pub async fn get(&self) -> Option<Listing> {
        self.cache.get(LISTING_KEY).await
    }

    pub async fn insert(&self, listing: Listing) {
        self.cache.insert(LISTING_KEY, listing).await;
    }

    /// Cache a listing fetched after reading `generation`, unless a write
    /// has been announced since. Returns whether the listing was kept.
    pub async fn insert_fetched(&self, generation: u64, listing: Listing) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.cache.insert(LISTING_KEY, listing).await;

        // A write that bumped the counter between the check and the insert
        // may already have invalidated; drop the entry ourselves.
        if self.generation() != generation {
            self.invalidate().await;
            return false;
        }
        true
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(LISTING_KEY).await;
    }
}

#[async_trait]
impl WriteListener for ListingCache {
    async fn on_write(&self, _event: &WriteEvent) {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.invalidate().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cadastro_core::CustomerId;

    use super::*;
    use crate::customers::events::WriteKind;
    use crate::customers::store::seed_customers;

    #[tokio::test]
    async fn test_write_event_drops_listing() {
        let cache = ListingCache::new(Duration::from_secs(300));
        cache
            .insert(Listing {
                customers: Arc::new(seed_customers()),
                served_by: Source::Local,
            })
            .await;
        assert_eq!(cache.get().await.unwrap().customers.len(), 2);

        cache
            .on_write(&WriteEvent {
                kind: WriteKind::CustomerDeleted,
                customer_id: CustomerId::new("1"),
                address_id: None,
                served_by: Source::Local,
            })
            .await;

        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_listing_fetched_before_a_write_is_not_kept() {
        let cache = ListingCache::new(Duration::from_secs(300));
        let listing = || Listing {
            customers: Arc::new(seed_customers()),
            served_by: Source::Remote,
        };

        let before = cache.generation();
        cache
            .on_write(&WriteEvent {
                kind: WriteKind::CustomerCreated,
                customer_id: CustomerId::new("3"),
                address_id: None,
                served_by: Source::Remote,
            })
            .await;

        assert!(!cache.insert_fetched(before, listing()).await);
        assert!(cache.get().await.is_none());

        assert!(cache.insert_fetched(cache.generation(), listing()).await);
        assert!(cache.get().await.is_some());
    }
}
