//! One-time code repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vitrine_core::{OtpPurpose, UserId};

use super::RepositoryError;
use crate::models::otp::OtpRecord;
use crate::services::otp::OtpStore;

const OTP_COLUMNS: &str = "id, user_id, purpose, code_hash, created_at, expires_at";

/// Repository for `storefront.otp_verifications`.
#[derive(Clone, Copy)]
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    /// Create a new OTP repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn delete_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        record: &OtpRecord,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.otp_verifications WHERE id = $1 AND code_hash = $2",
        )
        .bind(record.id)
        .bind(&record.code_hash)
        .execute(&mut **tx)
        .await?;

        // Reissued or already consumed by a concurrent request.
        if result.rows_affected() != 1 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OtpStore for OtpRepository<'_> {
    async fn upsert(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code_hash: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpRecord, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(&format!(
            r"
            INSERT INTO storefront.otp_verifications
                (user_id, purpose, code_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, purpose) DO UPDATE
            SET code_hash = EXCLUDED.code_hash,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            RETURNING {OTP_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(purpose)
        .bind(code_hash)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;
        Ok(record)
    }

    async fn find(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(&format!(
            r"
            SELECT {OTP_COLUMNS} FROM storefront.otp_verifications
            WHERE user_id = $1 AND purpose = $2
            "
        ))
        .bind(user_id)
        .bind(purpose)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    async fn complete_email_verification(
        &self,
        record: &OtpRecord,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE storefront.users SET email_verified = $2, updated_at = now() WHERE id = $1",
        )
        .bind(record.user_id)
        .bind(verified_at)
        .execute(&mut *tx)
        .await?;

        Self::delete_in(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        record: &OtpRecord,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE storefront.users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(record.user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        Self::delete_in(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }
}
