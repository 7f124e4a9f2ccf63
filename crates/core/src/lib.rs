//! Cadastro Core - Shared types library.
//!
//! This crate provides the domain types used across all Cadastro components:
//! - `dashboard` - Customer registration API, demo login, Celcoin integration
//! - `integration-tests` - End-to-end tests against a mocked provider
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no clocks beyond the timestamps callers pass in. This keeps it
//! lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Customer, address, ids, email, status and write inputs
//! - [`validation`] - Boundary validation for write inputs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{Validate, ValidationError};
