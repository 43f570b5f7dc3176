//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an account
//! cw-cli user create -e owner@shop.test -n "Shop Owner" -p 'long-password' -r admin
//!
//! # Deactivate / reactivate an account
//! cw-cli user deactivate -e pat@shop.test -r customer
//! cw-cli user activate -e pat@shop.test -r customer
//! ```

use chrono::TimeDelta;

use cartwright_core::{Email, UserId};
use cartwright_storefront::services::auth::AuthService;
use cartwright_storefront::store::UserStore;

use super::{CliError, connect, parse_role};

/// Create an account.
///
/// # Errors
///
/// Returns an error if the input is invalid or the account already exists.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, CliError> {
    let role = parse_role(role)?;
    let store = connect().await?;

    // Reset TTL is irrelevant for sign-up.
    let user = AuthService::new(&store, TimeDelta::zero())
        .sign_up(name, email, password, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}

/// Activate or deactivate an account.
///
/// Deactivation takes effect on the account's next request; existing
/// sessions are not deleted.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account matches.
pub async fn set_active(email: &str, role: &str, active: bool) -> Result<(), CliError> {
    let role = parse_role(role)?;
    let email = Email::parse(email)?;
    let store = connect().await?;

    let user = store
        .find_user(&email, role)
        .await?
        .ok_or_else(|| CliError::UserNotFound {
            email: email.to_string(),
            role,
        })?;

    let user = store.set_active(user.id, active).await?;
    tracing::info!(
        user_id = %user.id,
        active = user.is_active,
        "Account {}",
        if active { "activated" } else { "deactivated" }
    );
    Ok(())
}
