//! Administrator management commands.
//!
//! # Usage
//!
//! ```bash
//! # Give an existing account the ADMIN role
//! vitrine admin promote -e ana@example.com
//!
//! # Create a verified administrator directly
//! vitrine admin create -e ana@example.com -n Ana -p 'a long password'
//! ```

use vitrine_core::{Email, Role};
use vitrine_storefront::db::{RepositoryError, UserRepository};
use vitrine_storefront::services::auth::{AuthError, AuthService};

use super::{CommandError, connect};

/// Give the account with `email` the admin role.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no account has that email.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(AuthError::from)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, Role::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CommandError::UserNotFound(email.to_string()),
            other => CommandError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(())
}

/// Create a verified administrator account.
///
/// The same name, email and password rules as public registration apply.
///
/// # Errors
///
/// Returns an error if validation fails or the email or name is taken.
pub async fn create(email: &str, name: &str, password: &str) -> Result<(), CommandError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .register(name, email, password, Role::Admin)
        .await?;
    UserRepository::new(&pool).mark_verified(user.id).await?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        "Admin user created successfully"
    );
    Ok(())
}
