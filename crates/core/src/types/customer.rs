//! Customer and address records, plus the write inputs that mutate them.
//!
//! Records use the provider's camelCase wire format. Write inputs are
//! explicit partial structs: [`NewCustomer`] and [`NewAddress`] for
//! creation, [`CustomerPatch`] and [`AddressPatch`] for edits. A field left
//! as `None` in a patch keeps its current value.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AddressId, CustomerId};
use super::status::CustomerStatus;

// =============================================================================
// Records
// =============================================================================

/// A postal address owned by exactly one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Unique within the owning customer's address list.
    pub id: AddressId,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl Address {
    /// Human-readable label used in delete confirmations ("Rua X, 1").
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}, {}", self.street, self.number)
    }
}

/// A customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// CPF or CNPJ, as typed (masks are kept).
    pub document: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: CustomerStatus,
    #[serde(default)]
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Fallback label when a customer has no name.
    pub const UNNAMED_LABEL: &'static str = "Customer";

    /// Human-readable label used in delete confirmations.
    #[must_use]
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            Self::UNNAMED_LABEL.to_owned()
        } else {
            self.name.clone()
        }
    }

    /// Find an address by id.
    #[must_use]
    pub fn address(&self, id: &AddressId) -> Option<&Address> {
        self.addresses.iter().find(|a| &a.id == id)
    }

    /// Find an address by id, mutably.
    pub fn address_mut(&mut self, id: &AddressId) -> Option<&mut Address> {
        self.addresses.iter_mut().find(|a| &a.id == id)
    }

    /// Refresh `updated_at`.
    ///
    /// The stamp never moves backwards and never falls before `created_at`,
    /// even if the wall clock does.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at).max(self.created_at);
    }

    /// Shallow-merge a patch over this record.
    ///
    /// Scalar fields present in the patch overwrite the current value. A
    /// present `addresses` list replaces the current list wholesale; entries
    /// without an id, or repeating an id already used earlier in the list,
    /// receive one from `mint`. Timestamps are left to the caller.
    pub fn apply(&mut self, patch: CustomerPatch, mut mint: impl FnMut() -> AddressId) {
        let CustomerPatch {
            name,
            document,
            email,
            phone,
            status,
            addresses,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(document) = document {
            self.document = document;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(addresses) = addresses {
            self.addresses = assign_address_ids(addresses, &mut mint);
        }
    }
}

/// Turn address inputs into owned addresses with ids unique within the list.
pub fn assign_address_ids(
    inputs: Vec<NewAddress>,
    mut mint: impl FnMut() -> AddressId,
) -> Vec<Address> {
    let mut seen: HashSet<AddressId> = HashSet::with_capacity(inputs.len());
    inputs
        .into_iter()
        .map(|input| {
            let id = match input.id.clone() {
                Some(id) if !seen.contains(&id) => id,
                _ => mint(),
            };
            seen.insert(id.clone());
            input.into_address(id)
        })
        .collect()
}

// =============================================================================
// Write inputs
// =============================================================================

/// Address fields as submitted by a form or API client.
///
/// Omitted fields deserialize as empty strings; validation rejects them at
/// the boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAddress {
    /// Existing id, kept when a full address list is resubmitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AddressId>,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl NewAddress {
    /// Attach an id, producing a stored address.
    #[must_use]
    pub fn into_address(self, id: AddressId) -> Address {
        Address {
            id,
            street: self.street,
            number: self.number,
            neighborhood: self.neighborhood,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
        }
    }
}

impl From<&Address> for NewAddress {
    fn from(address: &Address) -> Self {
        Self {
            id: Some(address.id.clone()),
            street: address.street.clone(),
            number: address.number.clone(),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zipcode: address.zipcode.clone(),
        }
    }
}

/// Registration input: every field is required and at least one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCustomer {
    pub name: String,
    pub document: String,
    pub email: String,
    pub phone: String,
    pub addresses: Vec<NewAddress>,
}

/// Partial customer update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
    /// Replaces the whole address list when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<NewAddress>>,
}

impl CustomerPatch {
    /// Returns true if the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.document.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.status.is_none()
            && self.addresses.is_none()
    }

    /// Overlay another patch: fields present in `other` win.
    pub fn merge(&mut self, other: Self) {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.document.is_some() {
            self.document = other.document;
        }
        if other.email.is_some() {
            self.email = other.email;
        }
        if other.phone.is_some() {
            self.phone = other.phone;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.addresses.is_some() {
            self.addresses = other.addresses;
        }
    }

    /// Fields of this draft that differ from `original`, the snapshot the
    /// draft was seeded from. Untouched fields are left out, so they are
    /// neither validated nor sent.
    #[must_use]
    pub fn changes_since(&self, original: &Self) -> Self {
        Self {
            name: changed(self.name.as_ref(), original.name.as_ref()),
            document: changed(self.document.as_ref(), original.document.as_ref()),
            email: changed(self.email.as_ref(), original.email.as_ref()),
            phone: changed(self.phone.as_ref(), original.phone.as_ref()),
            status: changed(self.status.as_ref(), original.status.as_ref()),
            addresses: changed(self.addresses.as_ref(), original.addresses.as_ref()),
        }
    }
}

/// `current` when it differs from `original`.
fn changed<T: PartialEq + Clone>(current: Option<&T>, original: Option<&T>) -> Option<T> {
    current.filter(|value| Some(*value) != original).cloned()
}

impl From<NewCustomer> for CustomerPatch {
    fn from(input: NewCustomer) -> Self {
        Self {
            name: Some(input.name),
            document: Some(input.document),
            email: Some(input.email),
            phone: Some(input.phone),
            status: None,
            addresses: Some(input.addresses),
        }
    }
}

/// A full snapshot of a record, used to seed an edit buffer.
impl From<&Customer> for CustomerPatch {
    fn from(customer: &Customer) -> Self {
        Self {
            name: Some(customer.name.clone()),
            document: Some(customer.document.clone()),
            email: Some(customer.email.clone()),
            phone: Some(customer.phone.clone()),
            status: Some(customer.status),
            addresses: Some(customer.addresses.iter().map(NewAddress::from).collect()),
        }
    }
}

/// Partial address update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
}

impl AddressPatch {
    /// Overwrite the fields this patch carries.
    pub fn apply_to(self, address: &mut Address) {
        if let Some(street) = self.street {
            address.street = street;
        }
        if let Some(number) = self.number {
            address.number = number;
        }
        if let Some(neighborhood) = self.neighborhood {
            address.neighborhood = neighborhood;
        }
        if let Some(city) = self.city {
            address.city = city;
        }
        if let Some(state) = self.state {
            address.state = state;
        }
        if let Some(zipcode) = self.zipcode {
            address.zipcode = zipcode;
        }
    }

    /// Fields of this draft that differ from `original`.
    #[must_use]
    pub fn changes_since(&self, original: &Self) -> Self {
        Self {
            street: changed(self.street.as_ref(), original.street.as_ref()),
            number: changed(self.number.as_ref(), original.number.as_ref()),
            neighborhood: changed(self.neighborhood.as_ref(), original.neighborhood.as_ref()),
            city: changed(self.city.as_ref(), original.city.as_ref()),
            state: changed(self.state.as_ref(), original.state.as_ref()),
            zipcode: changed(self.zipcode.as_ref(), original.zipcode.as_ref()),
        }
    }

    /// Overlay another patch: fields present in `other` win.
    pub fn merge(&mut self, other: Self) {
        if other.street.is_some() {
            self.street = other.street;
        }
        if other.number.is_some() {
            self.number = other.number;
        }
        if other.neighborhood.is_some() {
            self.neighborhood = other.neighborhood;
        }
        if other.city.is_some() {
            self.city = other.city;
        }
        if other.state.is_some() {
            self.state = other.state;
        }
        if other.zipcode.is_some() {
            self.zipcode = other.zipcode;
        }
    }
}

impl From<&Address> for AddressPatch {
    fn from(address: &Address) -> Self {
        Self {
            street: Some(address.street.clone()),
            number: Some(address.number.clone()),
            neighborhood: Some(address.neighborhood.clone()),
            city: Some(address.city.clone()),
            state: Some(address.state.clone()),
            zipcode: Some(address.zipcode.clone()),
        }
    }
}

/// Treat a full draft as an address input, e.g. for the add-address flow.
impl From<AddressPatch> for NewAddress {
    fn from(patch: AddressPatch) -> Self {
        Self {
            id: None,
            street: patch.street.unwrap_or_default(),
            number: patch.number.unwrap_or_default(),
            neighborhood: patch.neighborhood.unwrap_or_default(),
            city: patch.city.unwrap_or_default(),
            state: patch.state.unwrap_or_default(),
            zipcode: patch.zipcode.unwrap_or_default(),
        }
    }
}
