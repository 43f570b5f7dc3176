//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] cartwright_core::EmailError),

    /// Display name was blank.
    #[error("name cannot be empty")]
    EmptyName,

    /// Invalid credentials (wrong password or account not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email and role already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The account is deactivated.
    #[error("inactive user")]
    InactiveUser,

    /// No signed-in identity, or the session refers to a missing account.
    #[error("not authenticated")]
    Unauthorized,

    /// Signed in, but with the wrong role for this operation.
    #[error("insufficient permissions")]
    Forbidden,

    /// Reset token unknown, expired, or already used.
    #[error("invalid or expired reset token")]
    InvalidToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
