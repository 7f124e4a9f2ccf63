//! Business logic services for the dashboard.
//!
//! # Services
//!
//! - `auth` - Demo credential check for the single operator account

pub mod auth;

pub use auth::{AuthError, DemoAuthenticator};
