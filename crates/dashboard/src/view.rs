//! Table view state for the customer dashboard.
//!
//! One [`CustomerTableState`] is kept per signed-in session, on the server
//! in [`SessionTables`]. It tracks the column filters, which rows are
//! expanded, the customer and address being edited, the new-address draft
//! and any pending deletion. Edits follow the same small state machine
//! ([`EditState`]):
//!
//! ```text
//! Viewing --begin--> Editing --begin_save--> Saving --ok--> Viewing
//!    ^                  |  ^                    |
//!    +------cancel------+  +--------err---------+
//! ```
//!
//! Starting a new edit discards the previous buffer; cancelling never
//! touches the network. Each edit keeps the snapshot its buffer was seeded
//! from, and a save submits only the fields that differ from it.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use cadastro_core::{AddressId, AddressPatch, Customer, CustomerId, CustomerPatch};

use crate::customers::Listing;

// =============================================================================
// Filters
// =============================================================================

/// Per-column filters. Empty fields match everything; non-empty fields are
/// case-insensitive substring matches and must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerFilters {
    pub id: String,
    pub name: String,
    pub document: String,
    pub email: String,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl CustomerFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.id, &self.name, &self.document, &self.email]
            .iter()
            .all(|f| f.trim().is_empty())
    }

    #[must_use]
    pub fn matches(&self, customer: &Customer) -> bool {
        contains_ignore_case(customer.id.as_str(), &self.id)
            && contains_ignore_case(&customer.name, &self.name)
            && contains_ignore_case(&customer.document, &self.document)
            && contains_ignore_case(&customer.email, &self.email)
    }

    /// Matching rows, in listing order.
    #[must_use]
    pub fn apply(&self, customers: &[Customer]) -> Vec<Customer> {
        customers
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Edit state machine
// =============================================================================

/// An edit buffer that can tell which of its fields were edited.
pub trait Draft: Clone {
    /// Fields of `self` that differ from `original`.
    #[must_use]
    fn changes_since(&self, original: &Self) -> Self;
}

impl Draft for CustomerPatch {
    fn changes_since(&self, original: &Self) -> Self {
        Self::changes_since(self, original)
    }
}

impl Draft for AddressPatch {
    fn changes_since(&self, original: &Self) -> Self {
        Self::changes_since(self, original)
    }
}

/// Edit lifecycle for one target of type `K` with a buffer of type `B`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState<K, B> {
    Viewing,
    Editing {
        target: K,
        buffer: B,
        /// The buffer as the edit began.
        original: B,
        /// Error of the last failed save, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Saving {
        target: K,
        buffer: B,
        original: B,
    },
}

impl<K, B> Default for EditState<K, B> {
    fn default() -> Self {
        Self::Viewing
    }
}

impl<K: PartialEq + Clone, B: Draft> EditState<K, B> {
    /// Start editing `target`, replacing whatever edit was in progress.
    pub fn begin(&mut self, target: K, buffer: B) {
        *self = Self::Editing {
            target,
            original: buffer.clone(),
            buffer,
            error: None,
        };
    }

    /// Change the buffer. Returns `false` unless an edit is open.
    pub fn update(&mut self, change: impl FnOnce(&mut B)) -> bool {
        match self {
            Self::Editing { buffer, .. } => {
                change(buffer);
                true
            }
            Self::Viewing | Self::Saving { .. } => false,
        }
    }

    /// Move an open edit to `Saving` and hand back what to submit: the
    /// fields changed since the edit began.
    pub fn begin_save(&mut self) -> Option<(K, B)> {
        match std::mem::take(self) {
            Self::Editing {
                target,
                buffer,
                original,
                ..
            } => {
                let changes = buffer.changes_since(&original);
                *self = Self::Saving {
                    target: target.clone(),
                    buffer,
                    original,
                };
                Some((target, changes))
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Record the outcome of a save for `target`.
    ///
    /// Success closes the edit; failure reopens it with the error and the
    /// buffer as it was. Outcomes for any other target are ignored, since a
    /// newer edit has replaced that one.
    pub fn finish_save<E: Display>(&mut self, target: &K, outcome: Result<(), E>) {
        let Self::Saving {
            target: saving, ..
        } = self
        else {
            return;
        };
        if &*saving != target {
            return;
        }

        match (std::mem::take(self), outcome) {
            (_, Ok(())) => {}
            (
                Self::Saving {
                    target,
                    buffer,
                    original,
                },
                Err(err),
            ) => {
                *self = Self::Editing {
                    target,
                    buffer,
                    original,
                    error: Some(err.to_string()),
                };
            }
            (other, Err(_)) => *self = other,
        }
    }

    /// Drop an open edit. Idempotent; an in-flight save is left alone.
    pub fn cancel(&mut self) {
        if matches!(self, Self::Editing { .. }) {
            *self = Self::Viewing;
        }
    }

    /// Target of the open or saving edit.
    #[must_use]
    pub const fn target(&self) -> Option<&K> {
        match self {
            Self::Viewing => None,
            Self::Editing { target, .. } | Self::Saving { target, .. } => Some(target),
        }
    }

    #[must_use]
    pub const fn buffer(&self) -> Option<&B> {
        match self {
            Self::Viewing => None,
            Self::Editing { buffer, .. } | Self::Saving { buffer, .. } => Some(buffer),
        }
    }

    #[must_use]
    pub const fn is_viewing(&self) -> bool {
        matches!(self, Self::Viewing)
    }

    #[must_use]
    pub const fn is_saving(&self) -> bool {
        matches!(self, Self::Saving { .. })
    }
}

// =============================================================================
// Table state
// =============================================================================

/// One address of one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTarget {
    pub customer_id: CustomerId,
    pub address_id: AddressId,
}

/// A deletion waiting for confirmation, with the label shown in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion<K> {
    pub target: K,
    pub label: String,
}

/// Everything the dashboard table remembers between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerTableState {
    pub filters: CustomerFilters,
    pub expanded: BTreeSet<CustomerId>,
    pub customer_edit: EditState<CustomerId, CustomerPatch>,
    pub address_edit: EditState<AddressTarget, AddressPatch>,
    /// Add-address draft, keyed by the owning customer.
    pub new_address: EditState<CustomerId, AddressPatch>,
    pub pending_customer_deletion: Option<PendingDeletion<CustomerId>>,
    pub pending_address_deletion: Option<PendingDeletion<AddressTarget>>,
}

impl CustomerTableState {
    /// Open `customer` for editing, buffer seeded from the record.
    pub fn begin_customer_edit(&mut self, customer: &Customer) {
        self.customer_edit
            .begin(customer.id.clone(), CustomerPatch::from(customer));
    }

    /// Open one address for editing. Returns `false` when the customer has
    /// no such address.
    pub fn begin_address_edit(&mut self, customer: &Customer, address_id: &AddressId) -> bool {
        let Some(address) = customer.address(address_id) else {
            return false;
        };
        self.address_edit.begin(
            AddressTarget {
                customer_id: customer.id.clone(),
                address_id: address_id.clone(),
            },
            AddressPatch::from(address),
        );
        true
    }

    /// Open an empty add-address draft for `customer_id`.
    pub fn begin_new_address(&mut self, customer_id: CustomerId) {
        self.new_address.begin(customer_id, AddressPatch::default());
    }

    /// Expand or collapse a row. Returns whether it is now expanded.
    pub fn toggle_expanded(&mut self, id: &CustomerId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    pub fn request_customer_deletion(&mut self, customer: &Customer) {
        self.pending_customer_deletion = Some(PendingDeletion {
            target: customer.id.clone(),
            label: customer.label(),
        });
    }

    /// Take the pending customer deletion, if any, for execution.
    pub fn confirm_customer_deletion(&mut self) -> Option<PendingDeletion<CustomerId>> {
        self.pending_customer_deletion.take()
    }

    pub fn cancel_customer_deletion(&mut self) {
        self.pending_customer_deletion = None;
    }

    /// Returns `false` when the customer has no such address.
    pub fn request_address_deletion(&mut self, customer: &Customer, address_id: &AddressId) -> bool {
        let Some(address) = customer.address(address_id) else {
            return false;
        };
        self.pending_address_deletion = Some(PendingDeletion {
            target: AddressTarget {
                customer_id: customer.id.clone(),
                address_id: address_id.clone(),
            },
            label: address.label(),
        });
        true
    }

    pub fn confirm_address_deletion(&mut self) -> Option<PendingDeletion<AddressTarget>> {
        self.pending_address_deletion.take()
    }

    pub fn cancel_address_deletion(&mut self) {
        self.pending_address_deletion = None;
    }

    /// Drop every reference to a customer that no longer exists.
    pub fn forget_customer(&mut self, id: &CustomerId) {
        self.expanded.remove(id);
        if self.customer_edit.target() == Some(id) {
            self.customer_edit = EditState::Viewing;
        }
        if self.address_edit.target().is_some_and(|t| &t.customer_id == id) {
            self.address_edit = EditState::Viewing;
        }
        if self.new_address.target() == Some(id) {
            self.new_address = EditState::Viewing;
        }
        if self
            .pending_customer_deletion
            .as_ref()
            .is_some_and(|p| &p.target == id)
        {
            self.pending_customer_deletion = None;
        }
        if self
            .pending_address_deletion
            .as_ref()
            .is_some_and(|p| &p.target.customer_id == id)
        {
            self.pending_address_deletion = None;
        }
    }

    /// Drop every reference to an address that no longer exists.
    pub fn forget_address(&mut self, target: &AddressTarget) {
        if self.address_edit.target() == Some(target) {
            self.address_edit = EditState::Viewing;
        }
        if self
            .pending_address_deletion
            .as_ref()
            .is_some_and(|p| &p.target == target)
        {
            self.pending_address_deletion = None;
        }
    }
}

// =============================================================================
// Per-session tables
// =============================================================================

/// One session's table, locked for the length of a transition.
pub type TableHandle = Arc<Mutex<CustomerTableState>>;

/// Table state of every signed-in session, keyed by session id.
///
/// Each request locks the session's [`TableHandle`], applies its transition
/// and releases it; saves release it while the provider call is in flight
/// and re-lock to record the outcome on whatever the table is by then.
#[derive(Clone)]
pub struct SessionTables {
    tables: Cache<String, TableHandle>,
}

impl SessionTables {
    /// Tables unused for `idle` are dropped, like their sessions.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            tables: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// The table of session `key`, empty on first use.
    pub async fn handle(&self, key: &str) -> TableHandle {
        self.tables
            .get_with_by_ref(key, async { TableHandle::default() })
            .await
    }

    pub async fn remove(&self, key: &str) {
        self.tables.invalidate(key).await;
    }
}

// =============================================================================
// Dashboard view
// =============================================================================

/// Message shown when no access token could be obtained.
pub const CANNOT_CONNECT_MESSAGE: &str = "Cannot connect to Celcoin API";

/// What the dashboard renders: rows (possibly none) or a connection error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardView {
    Ready {
        customers: Vec<Customer>,
        /// Row count before filtering.
        total: usize,
        demo_mode: bool,
        table: CustomerTableState,
    },
    Unavailable {
        message: String,
    },
}

impl DashboardView {
    /// Filtered rows of `listing` under `table`'s filters.
    #[must_use]
    pub fn ready(listing: &Listing, table: CustomerTableState) -> Self {
        Self::Ready {
            customers: table.filters.apply(&listing.customers),
            total: listing.customers.len(),
            demo_mode: listing.served_by == crate::customers::Source::Local,
            table,
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self::Unavailable {
            message: CANNOT_CONNECT_MESSAGE.to_string(),
        }
    }
}
