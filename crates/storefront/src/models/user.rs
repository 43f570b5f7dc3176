//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwright_core::{Email, UserId, UserRole};

/// A storefront account (customer or admin).
///
/// The password hash is never part of this type; it is only read through
/// `UserStore::get_password_hash`.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized email address.
    pub email: Email,
    /// Account role.
    pub role: UserRole,
    /// Deactivated accounts cannot sign in or check out.
    pub is_active: bool,
    /// Last successful password sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: UserRole,
}
