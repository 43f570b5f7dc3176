//! Authentication service.
//!
//! Password accounts, password reset tokens, and the identity provider that
//! turns a credential into an [`Identity`] for every request.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{TimeDelta, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::instrument;

use cartwright_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::models::{NewUser, User};
use crate::store::UserStore;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Random bytes in a password-reset token.
const RESET_TOKEN_BYTES: usize = 32;

// =============================================================================
// Identity
// =============================================================================

/// Something that can be exchanged for an [`Identity`].
#[derive(Debug, Clone)]
pub enum Credential {
    /// Email, password and the role the caller is signing in as.
    Password {
        email: String,
        password: String,
        role: UserRole,
    },
    /// A user ID held in a server-side session.
    Session(UserId),
}

/// A resolved principal.
///
/// Always read fresh from the store, so deactivation and role changes apply
/// to the very next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Email,
    pub role: UserRole,
    pub active: bool,
}

impl Identity {
    /// Fail with `InactiveUser` unless the account is active.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InactiveUser` for deactivated accounts.
    pub const fn require_active(&self) -> Result<(), AuthError> {
        if self.active {
            Ok(())
        } else {
            Err(AuthError::InactiveUser)
        }
    }

    /// Fail with `Forbidden` unless the identity holds `role`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` on a role mismatch.
    pub fn require_role(&self, role: UserRole) -> Result<(), AuthError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            active: user.is_active,
        }
    }
}

/// Resolves credentials into identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve `credential`.
    ///
    /// Password credentials fail with `InvalidCredentials` or `InactiveUser`.
    /// Session credentials fail with `Unauthorized` if the account is gone and
    /// otherwise report `active` for the caller to check.
    async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError>;
}

// =============================================================================
// Service
// =============================================================================

/// Authentication service.
///
/// Handles registration, sign-in, and password reset over any [`UserStore`].
pub struct AuthService<'a, S: ?Sized> {
    users: &'a S,
    reset_token_ttl: TimeDelta,
}

impl<'a, S: UserStore + ?Sized> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a S, reset_token_ttl: TimeDelta) -> Self {
        Self {
            users,
            reset_token_ttl,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is taken for this role.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::EmptyName);
        }
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_user(NewUser {
                name: name.to_owned(),
                email,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }

    /// Sign in with email and password, recording the login time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::InactiveUser` if the account is deactivated.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Identity, AuthError> {
        let identity = self
            .authenticate(&Credential::Password {
                email: email.to_owned(),
                password: password.to_owned(),
                role,
            })
            .await?;

        self.users
            .record_login(identity.user_id, Utc::now())
            .await?;
        Ok(identity)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for the account, if it exists.
    ///
    /// Returns the raw token to deliver to the account holder. Only its
    /// SHA-256 hash is stored. Callers should answer identically whether or
    /// not an account was found.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    #[instrument(skip(self))]
    pub async fn forgot_password(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<Option<(User, String)>, AuthError> {
        let email = Email::parse(email)?;
        let Some(user) = self.users.find_user(&email, role).await? else {
            tracing::debug!("password reset requested for unknown account");
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + self.reset_token_ttl;
        self.users
            .set_reset_token(user.id, &hash_token(&token), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "password reset token issued");
        Ok(Some((user, token)))
    }

    /// Consume a reset token and set a new password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    /// Returns `AuthError::InvalidToken` if the token is unknown, expired, or used.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let user_id = self
            .users
            .reset_password(&hash_token(token), Utc::now(), &password_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        tracing::info!(user_id = %user_id, "password reset");
        Ok(())
    }
}

#[async_trait]
impl<S: UserStore + ?Sized> IdentityProvider for AuthService<'_, S> {
    async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError> {
        match credential {
            Credential::Password {
                email,
                password,
                role,
            } => {
                let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
                let user = self
                    .users
                    .find_user(&email, *role)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;
                let password_hash = self
                    .users
                    .get_password_hash(user.id)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;

                verify_password(password, &password_hash)?;

                let identity = Identity::from(&user);
                identity.require_active()?;
                Ok(identity)
            }
            Credential::Session(user_id) => {
                let user = self
                    .users
                    .get_user(*user_id)
                    .await?
                    .ok_or(AuthError::Unauthorized)?;
                Ok(Identity::from(&user))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();
    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A URL-safe random token.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex-encoded SHA-256 of a token, as stored in the database.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(store: &MemoryStore) -> AuthService<'_, MemoryStore> {
        AuthService::new(store, TimeDelta::minutes(15))
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let auth = service(&store);
        let user = auth
            .sign_up("Ada", "Ada@Example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");

        let identity = auth
            .sign_in("ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(identity.user_id, user.id);
        assert!(identity.active);

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_sign_in_does_not_enumerate_accounts() {
        let store = MemoryStore::new();
        let auth = service(&store);
        auth.sign_up("Ada", "ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();

        let wrong_password = auth
            .sign_in("ada@example.com", "nope-nope", UserRole::Customer)
            .await;
        let wrong_role = auth
            .sign_in("ada@example.com", "hunter22", UserRole::Admin)
            .await;
        let unknown = auth
            .sign_in("who@example.com", "hunter22", UserRole::Customer)
            .await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong_role, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_short_password_and_duplicates() {
        let store = MemoryStore::new();
        let auth = service(&store);
        assert!(matches!(
            auth.sign_up("Ada", "ada@example.com", "12345", UserRole::Customer)
                .await,
            Err(AuthError::WeakPassword(_))
        ));

        auth.sign_up("Ada", "ada@example.com", "123456", UserRole::Customer)
            .await
            .unwrap();
        assert!(matches!(
            auth.sign_up("Ada", "ada@example.com", "123456", UserRole::Customer)
                .await,
            Err(AuthError::UserAlreadyExists)
        ));
        assert!(
            auth.sign_up("Ada", "ada@example.com", "123456", UserRole::Admin)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_sign_in() {
        let store = MemoryStore::new();
        let auth = service(&store);
        let user = auth
            .sign_up("Ada", "ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();
        store.set_active(user.id, false).await.unwrap();

        let result = auth
            .sign_in("ada@example.com", "hunter22", UserRole::Customer)
            .await;
        assert!(matches!(result, Err(AuthError::InactiveUser)));
    }

    #[tokio::test]
    async fn test_session_credential_reflects_deactivation() {
        let store = MemoryStore::new();
        let auth = service(&store);
        let user = auth
            .sign_up("Ada", "ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();

        let before = auth
            .authenticate(&Credential::Session(user.id))
            .await
            .unwrap();
        assert!(before.require_active().is_ok());

        store.set_active(user.id, false).await.unwrap();
        let after = auth
            .authenticate(&Credential::Session(user.id))
            .await
            .unwrap();
        assert!(matches!(after.require_active(), Err(AuthError::InactiveUser)));

        let missing = auth.authenticate(&Credential::Session(UserId::new(999))).await;
        assert!(matches!(missing, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let store = MemoryStore::new();
        let auth = service(&store);
        auth.sign_up("Ada", "ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();

        let (_, token) = auth
            .forgot_password("ada@example.com", UserRole::Customer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.len(), 43);

        auth.reset_password(&token, "new-secret").await.unwrap();
        assert!(
            auth.sign_in("ada@example.com", "new-secret", UserRole::Customer)
                .await
                .is_ok()
        );
        assert!(matches!(
            auth.reset_password(&token, "another-one").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_account_is_silent() {
        let store = MemoryStore::new();
        let auth = service(&store);
        let issued = auth
            .forgot_password("ghost@example.com", UserRole::Customer)
            .await
            .unwrap();
        assert!(issued.is_none());
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store, TimeDelta::minutes(-1));
        auth.sign_up("Ada", "ada@example.com", "hunter22", UserRole::Customer)
            .await
            .unwrap();
        let (_, token) = auth
            .forgot_password("ada@example.com", UserRole::Customer)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            auth.reset_password(&token, "new-secret").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_role_predicates() {
        let identity = Identity {
            user_id: UserId::new(1),
            email: Email::parse("a@b.io").unwrap(),
            role: UserRole::Admin,
            active: true,
        };
        assert!(identity.require_role(UserRole::Admin).is_ok());
        assert!(matches!(
            identity.require_role(UserRole::Customer),
            Err(AuthError::Forbidden)
        ));
    }
}
