//! One-time codes for email verification and password reset.
//!
//! A user holds at most one live code per purpose. Issuing a new one
//! replaces the old, and a failed check never consumes it; only a successful
//! verification deletes the record, in the same transaction that applies
//! its effect.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use vitrine_core::{Email, OtpPurpose, UserId};

use super::auth::{self, AuthError};
use super::email::EmailError;
use crate::db::RepositoryError;
use crate::models::otp::OtpRecord;
use crate::models::user::User;

/// How long an issued code stays valid.
pub const OTP_TTL: Duration = Duration::hours(1);

/// Storage for one-time codes.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert or replace the code for `(user_id, purpose)`.
    async fn upsert(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code_hash: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpRecord, RepositoryError>;

    async fn find(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, RepositoryError>;

    /// Mark the user verified and delete `record`, atomically.
    async fn complete_email_verification(
        &self,
        record: &OtpRecord,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Store the new password hash and delete `record`, atomically.
    async fn complete_password_reset(
        &self,
        record: &OtpRecord,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;
}

/// Outbound transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(
        &self,
        to: &Email,
        name: &str,
        code: &str,
    ) -> Result<(), EmailError>;

    async fn send_password_reset(
        &self,
        to: &Email,
        name: &str,
        link: &str,
    ) -> Result<(), EmailError>;
}

/// Errors from issuing or checking a code.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Verification code not found")]
    NotFound,

    #[error("Verification code has expired")]
    Expired,

    #[error("Verification code is incorrect")]
    Incorrect,

    #[error("code hashing failed")]
    Hash,

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn hash_code(code: &str) -> Result<String, OtpError> {
    auth::hash_password(code).map_err(|_| OtpError::Hash)
}

/// Random 4-digit verification code.
fn generate_verification_code() -> String {
    rand::rng().random_range(1000..=9999).to_string()
}

/// Issues, delivers and checks one-time codes.
pub struct OtpService<'a, S, M> {
    store: &'a S,
    mailer: &'a M,
    base_url: &'a str,
}

impl<'a, S: OtpStore, M: Mailer> OtpService<'a, S, M> {
    /// Create a new OTP service. `base_url` prefixes reset links.
    #[must_use]
    pub const fn new(store: &'a S, mailer: &'a M, base_url: &'a str) -> Self {
        Self {
            store,
            mailer,
            base_url,
        }
    }

    /// Link the reset email points to.
    #[must_use]
    pub fn reset_link(&self, user_id: UserId, token: &str) -> String {
        format!("{}/reset-password/{user_id}/{token}", self.base_url)
    }

    async fn store_code(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpRecord, OtpError> {
        let code_hash = hash_code(code)?;
        let record = self
            .store
            .upsert(user_id, purpose, &code_hash, now, now + OTP_TTL)
            .await?;
        Ok(record)
    }

    /// Send a fresh 4-digit verification code, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Repository` or `OtpError::Email` if storing or
    /// sending fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue_email_verification(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let code = generate_verification_code();
        self.store_code(user.id, OtpPurpose::EmailVerification, &code, now)
            .await?;
        self.mailer
            .send_verification_code(&user.email, &user.name, &code)
            .await?;
        info!("Verification code sent");
        Ok(())
    }

    /// Send a password reset link, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Repository` or `OtpError::Email` if storing or
    /// sending fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue_password_reset(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let token = Uuid::new_v4().to_string();
        self.store_code(user.id, OtpPurpose::PasswordReset, &token, now)
            .await?;
        let link = self.reset_link(user.id, &token);
        self.mailer
            .send_password_reset(&user.email, &user.name, &link)
            .await?;
        info!("Password reset link sent");
        Ok(())
    }

    /// Check `code` against the live record without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` with no record, `Expired` past expiry and
    /// `Incorrect` on a hash mismatch.
    pub async fn validate(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpRecord, OtpError> {
        let record = self
            .store
            .find(user_id, purpose)
            .await?
            .ok_or(OtpError::NotFound)?;

        if record.is_expired(now) {
            return Err(OtpError::Expired);
        }

        auth::verify_password(code, &record.code_hash).map_err(|e| match e {
            AuthError::InvalidCredentials => OtpError::Incorrect,
            _ => OtpError::Hash,
        })?;

        Ok(record)
    }

    /// Verify the user's email with a 4-digit code.
    ///
    /// # Errors
    ///
    /// See [`Self::validate`]. A concurrent reissue surfaces as
    /// `OtpError::Repository(NotFound)`.
    #[instrument(skip(self, code), fields(user_id = %user_id))]
    pub async fn verify_email(
        &self,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let record = self
            .validate(user_id, OtpPurpose::EmailVerification, code, now)
            .await?;
        self.store.complete_email_verification(&record, now).await?;
        info!("Email verified");
        Ok(())
    }

    /// Replace the user's password using a reset token.
    ///
    /// `new_password` must already satisfy the password rules.
    ///
    /// # Errors
    ///
    /// See [`Self::validate`].
    #[instrument(skip(self, token, new_password), fields(user_id = %user_id))]
    pub async fn reset_password(
        &self,
        user_id: UserId,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let record = self
            .validate(user_id, OtpPurpose::PasswordReset, token, now)
            .await?;
        let password_hash = auth::hash_password(new_password).map_err(|_| OtpError::Hash)?;
        self.store
            .complete_password_reset(&record, &password_hash)
            .await?;
        info!("Password reset");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use vitrine_core::{OtpId, Role};

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeOtpStore {
        records: Mutex<HashMap<(UserId, OtpPurpose), OtpRecord>>,
        pub(crate) verified: Mutex<Vec<(UserId, DateTime<Utc>)>>,
        pub(crate) passwords: Mutex<HashMap<UserId, String>>,
    }

    impl FakeOtpStore {
        async fn len(&self) -> usize {
            self.records.lock().await.len()
        }

        async fn take(&self, record: &OtpRecord) -> Result<(), RepositoryError> {
            let mut records = self.records.lock().await;
            match records.get(&(record.user_id, record.purpose)) {
                Some(r) if r.id == record.id && r.code_hash == record.code_hash => {
                    records.remove(&(record.user_id, record.purpose));
                    Ok(())
                }
                _ => Err(RepositoryError::NotFound),
            }
        }
    }

    #[async_trait]
    impl OtpStore for FakeOtpStore {
        async fn upsert(
            &self,
            user_id: UserId,
            purpose: OtpPurpose,
            code_hash: &str,
            created_at: DateTime<Utc>,
            expires_at: DateTime<Utc>,
        ) -> Result<OtpRecord, RepositoryError> {
            let mut records = self.records.lock().await;
            let id = records
                .get(&(user_id, purpose))
                .map_or_else(|| OtpId::new(i32::try_from(records.len()).unwrap() + 1), |r| r.id);
            let record = OtpRecord {
                id,
                user_id,
                purpose,
                code_hash: code_hash.to_string(),
                created_at,
                expires_at,
            };
            records.insert((user_id, purpose), record.clone());
            Ok(record)
        }

        async fn find(
            &self,
            user_id: UserId,
            purpose: OtpPurpose,
        ) -> Result<Option<OtpRecord>, RepositoryError> {
            Ok(self.records.lock().await.get(&(user_id, purpose)).cloned())
        }

        async fn complete_email_verification(
            &self,
            record: &OtpRecord,
            verified_at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.take(record).await?;
            self.verified.lock().await.push((record.user_id, verified_at));
            Ok(())
        }

        async fn complete_password_reset(
            &self,
            record: &OtpRecord,
            password_hash: &str,
        ) -> Result<(), RepositoryError> {
            self.take(record).await?;
            self.passwords
                .lock()
                .await
                .insert(record.user_id, password_hash.to_string());
            Ok(())
        }
    }

    /// Records every message instead of sending it.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub(crate) codes: Mutex<Vec<(String, String)>>,
        pub(crate) links: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification_code(
            &self,
            to: &Email,
            _name: &str,
            code: &str,
        ) -> Result<(), EmailError> {
            self.codes
                .lock()
                .await
                .push((to.as_str().to_string(), code.to_string()));
            Ok(())
        }

        async fn send_password_reset(
            &self,
            to: &Email,
            _name: &str,
            link: &str,
        ) -> Result<(), EmailError> {
            self.links
                .lock()
                .await
                .push((to.as_str().to_string(), link.to_string()));
            Ok(())
        }
    }

    const BASE_URL: &str = "https://loja.example";

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(42),
            name: "Maria".to_string(),
            email: Email::parse("maria@example.com").unwrap(),
            email_verified: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    async fn last_code(mailer: &RecordingMailer) -> String {
        mailer.codes.lock().await.last().unwrap().1.clone()
    }

    #[test]
    fn test_generated_code_is_four_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 4);
            let n: u32 = code.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_reset_link_format() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        assert_eq!(
            service.reset_link(UserId::new(5), "abc"),
            "https://loja.example/reset-password/5/abc"
        );
    }

    #[tokio::test]
    async fn test_verify_email_round() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let now = Utc::now();

        service.issue_email_verification(&user, now).await.unwrap();
        let code = last_code(&mailer).await;

        service.verify_email(user.id, &code, now).await.unwrap();

        assert_eq!(store.verified.lock().await.as_slice(), &[(user.id, now)]);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_expiry_is_one_hour() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let issued = Utc::now();

        service.issue_email_verification(&user, issued).await.unwrap();
        let record = store
            .find(user.id, OtpPurpose::EmailVerification)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.expires_at - record.created_at, OTP_TTL);
        assert_ne!(record.code_hash, last_code(&mailer).await);
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_kept() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let issued = Utc::now();

        service.issue_email_verification(&user, issued).await.unwrap();
        let code = last_code(&mailer).await;

        let later = issued + OTP_TTL + Duration::seconds(1);
        let result = service.verify_email(user.id, &code, later).await;

        assert!(matches!(result, Err(OtpError::Expired)));
        assert_eq!(store.len().await, 1);
        assert!(store.verified.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_code_valid_at_exact_expiry() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let issued = Utc::now();

        service.issue_email_verification(&user, issued).await.unwrap();
        let code = last_code(&mailer).await;

        assert!(service.verify_email(user.id, &code, issued + OTP_TTL).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_code_is_rejected_and_kept() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let now = Utc::now();

        service.issue_email_verification(&user, now).await.unwrap();
        let code = last_code(&mailer).await;
        let wrong = if code == "1234" { "4321" } else { "1234" };

        let result = service.verify_email(user.id, wrong, now).await;
        assert!(matches!(result, Err(OtpError::Incorrect)));

        // The right code still works after a miss.
        assert!(service.verify_email(user.id, &code, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_code_is_not_found() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);

        let result = service.verify_email(UserId::new(1), "1234", Utc::now()).await;
        assert!(matches!(result, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_code() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let now = Utc::now();

        service.issue_email_verification(&user, now).await.unwrap();
        let first = last_code(&mailer).await;
        service.issue_email_verification(&user, now).await.unwrap();
        let second = last_code(&mailer).await;

        assert_eq!(store.len().await, 1);
        if first != second {
            assert!(matches!(
                service.verify_email(user.id, &first, now).await,
                Err(OtpError::Incorrect)
            ));
        }
        assert!(service.verify_email(user.id, &second, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_password_reset_round() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let now = Utc::now();

        service.issue_password_reset(&user, now).await.unwrap();
        let (to, link) = mailer.links.lock().await.last().cloned().unwrap();
        assert_eq!(to, "maria@example.com");
        let prefix = format!("{BASE_URL}/reset-password/42/");
        assert!(link.starts_with(&prefix));
        let token = link.trim_start_matches(&prefix).to_string();
        assert!(Uuid::parse_str(&token).is_ok());

        service
            .reset_password(user.id, &token, "nova-senha", now)
            .await
            .unwrap();

        let passwords = store.passwords.lock().await;
        let hash = passwords.get(&user.id).unwrap();
        assert!(auth::verify_password("nova-senha", hash).is_ok());
        drop(passwords);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_purposes_are_independent() {
        let store = FakeOtpStore::default();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&store, &mailer, BASE_URL);
        let user = user();
        let now = Utc::now();

        service.issue_email_verification(&user, now).await.unwrap();
        service.issue_password_reset(&user, now).await.unwrap();
        let code = last_code(&mailer).await;

        let result = service.reset_password(user.id, &code, "nova-senha", now).await;
        assert!(matches!(result, Err(OtpError::Incorrect)));
        assert_eq!(store.len().await, 2);
    }
}
