//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while signing in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Login or password left blank.
    #[error("email and password are required")]
    MissingCredentials,

    /// Login or password do not match the demo account.
    #[error("invalid credentials")]
    InvalidCredentials,
}
