//! Types stored in the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Login used at sign-in.
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in [`super::CurrentUser`].
    pub const CURRENT_USER: &str = "current_user";
}
