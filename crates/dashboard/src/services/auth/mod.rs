//! Demo authentication.
//!
//! The dashboard has a single operator account configured through
//! `DEMO_USER_EMAIL` / `DEMO_USER_PASSWORD`. There is no user store and no
//! password hashing; a successful check yields the [`CurrentUser`] to put in
//! the session.

mod error;

pub use error::AuthError;

use chrono::Utc;
use secrecy::ExposeSecret;

use crate::config::DemoUserConfig;
use crate::models::CurrentUser;

/// Checks submitted credentials against the configured demo account.
#[derive(Debug, Clone)]
pub struct DemoAuthenticator {
    account: DemoUserConfig,
}

impl DemoAuthenticator {
    #[must_use]
    pub const fn new(account: DemoUserConfig) -> Self {
        Self { account }
    }

    /// Verify `email` / `password`.
    ///
    /// The login is compared case-insensitively after trimming; the password
    /// must match exactly.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` if either field is blank, or
    /// `AuthError::InvalidCredentials` if they do not match.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let email_matches = email.eq_ignore_ascii_case(self.account.email.trim());
        let password_matches = password == self.account.password.expose_secret();
        if !(email_matches && password_matches) {
            tracing::info!(email, "rejected sign-in attempt");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(CurrentUser {
            email: self.account.email.clone(),
            signed_in_at: Utc::now(),
        })
    }
}
