//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] vitrine_core::EmailAddressError),

    /// Display name outside the allowed length.
    #[error("{0}")]
    InvalidName(String),

    /// Invalid credentials (wrong password or user not found).
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Current password didn't verify on a password change.
    #[error("Current password is incorrect")]
    WrongPassword,

    /// New password and its confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// User not found.
    #[error("User not found")]
    UserNotFound,

    /// Email and/or name already registered.
    #[error("{}", taken_message(.email, .name))]
    Taken { email: bool, name: bool },

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn taken_message(email: &bool, name: &bool) -> &'static str {
    match (*email, *name) {
        (true, true) => "Email and name are already in use",
        (true, false) => "Email is already in use",
        _ => "Name is already in use",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taken_reports_both_conflicts() {
        let both = AuthError::Taken {
            email: true,
            name: true,
        };
        assert_eq!(both.to_string(), "Email and name are already in use");

        let name = AuthError::Taken {
            email: false,
            name: true,
        };
        assert_eq!(name.to_string(), "Name is already in use");
    }
}
