//! One-time code records.

use chrono::{DateTime, Utc};

use vitrine_core::{OtpId, OtpPurpose, UserId};

/// A stored one-time code. Only the Argon2 hash of the code is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub id: OtpId,
    pub user_id: UserId,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    /// Always `created_at + 1 hour`.
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    /// Whether the code is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
