//! Email address check used by customer write inputs.
//!
//! Customer records keep `email` as plain text; [`Email`] only exists so
//! that a write can be refused before it reaches Celcoin or the local store.

use serde::{Deserialize, Serialize};

/// Why an email address was refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("is required")]
    Empty,

    #[error("must be at most {max} characters")]
    TooLong { max: usize },

    #[error("cannot contain whitespace")]
    Whitespace,

    /// Zero or several `@`.
    #[error("must contain exactly one @")]
    AtSymbols,

    #[error("needs text before and after the @")]
    EmptyPart,
}

/// An email address that passed the registration form rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Check `raw` against the form rules. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns the first rule `raw` breaks.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let value = raw.trim();
        match value.len() {
            0 => return Err(EmailError::Empty),
            len if len > Self::MAX_LENGTH => {
                return Err(EmailError::TooLong {
                    max: Self::MAX_LENGTH,
                });
            }
            _ => {}
        }
        if value.contains(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let mut parts = value.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EmailError::AtSymbols);
        };
        if local.is_empty() || domain.is_empty() {
            return Err(EmailError::EmptyPart);
        }

        Ok(Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
