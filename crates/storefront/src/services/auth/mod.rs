//! Authentication and account service.
//!
//! Password registration and login, display-name and password changes.
//! Email verification and password reset codes live in
//! [`crate::services::otp`].

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::info;

use vitrine_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Allowed display-name length, in characters.
pub const NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=20;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new, unverified user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName`, `InvalidEmail` or `WeakPassword` on
    /// bad input, and `AuthError::Taken` naming every field already in use.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let taken = self.users.find_taken(&email, name).await?;
        if taken.any() {
            return Err(AuthError::Taken {
                email: taken.email,
                name: taken.name,
            });
        }

        let password_hash = hash_password(password)?;

        // A concurrent registration can still win between the check and the insert.
        let user = self
            .users
            .create(name, &email, &password_hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::Taken {
                    email: true,
                    name: true,
                },
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Change a user's display name.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName` or `AuthError::Taken` if the name is
    /// unusable, `UserNotFound` if the user is gone.
    pub async fn update_name(&self, user_id: UserId, name: &str) -> Result<User, AuthError> {
        let name = validate_name(name)?;

        if self.users.name_taken_by_other(user_id, name).await? {
            return Err(name_taken());
        }

        self.users
            .update_name(user_id, name)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => name_taken(),
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if any field is too short,
    /// `PasswordMismatch` if the confirmation differs and `WrongPassword` if
    /// the current password doesn't verify.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        validate_password(current)?;
        validate_password(new_password)?;
        validate_password(confirm)?;

        if new_password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(current, &password_hash).map_err(|e| match e {
            AuthError::InvalidCredentials => AuthError::WrongPassword,
            other => other,
        })?;

        let new_hash = hash_password(new_password)?;
        self.users
            .update_password(user_id, &new_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

const fn name_taken() -> AuthError {
    AuthError::Taken {
        email: false,
        name: true,
    }
}

/// Trim a display name and check its length.
///
/// # Errors
///
/// Returns `AuthError::InvalidName` outside 2 to 20 characters.
pub fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if NAME_LENGTH.contains(&name.chars().count()) {
        Ok(name)
    } else {
        Err(AuthError::InvalidName(format!(
            "Name must be between {} and {} characters",
            NAME_LENGTH.start(),
            NAME_LENGTH.end()
        )))
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if shorter than the minimum.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password (or one-time code) using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
