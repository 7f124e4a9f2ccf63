//! Core types for Cadastro.
//!
//! This module provides type-safe wrappers and records for the customer
//! registration domain.

pub mod customer;
pub mod document;
pub mod email;
pub mod id;
pub mod status;

pub use customer::{
    Address, AddressPatch, Customer, CustomerPatch, NewAddress, NewCustomer, assign_address_ids,
};
pub use document::{DocumentKind, digits_only};
pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
