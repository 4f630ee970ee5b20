//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vitrine_core::{Email, Role, UserId};

/// A storefront account.
///
/// The password hash is never part of this type; repositories return it
/// separately where a check needs it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name, unique across users.
    pub name: String,
    /// User's email address.
    pub email: Email,
    /// When the email was verified, `None` until the OTP flow completes.
    pub email_verified: Option<DateTime<Utc>>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the email address has been verified.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}
