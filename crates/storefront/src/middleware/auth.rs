//! Authentication extractors.
//!
//! The session only holds who signed in. Every extraction re-reads the account
//! through the identity provider, so deactivation and role changes apply to
//! the next request.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use cartwright_core::UserRole;

use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::{AuthError, Credential, Identity, IdentityProvider};
use crate::state::AppState;

/// Extractor for any signed-in, active account.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireUser(identity): RequireUser) -> Json<Identity> {
///     Json(identity)
/// }
/// ```
pub struct RequireUser(pub Identity);

/// Extractor for an active customer account (cart, checkout, orders).
pub struct RequireCustomer(pub Identity);

/// Extractor for an active admin account (catalog administration).
pub struct RequireAdmin(pub Identity);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        resolve_identity(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let identity = resolve_identity(parts, state).await?;
        identity.require_role(UserRole::Customer)?;
        Ok(Self(identity))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let identity = resolve_identity(parts, state).await?;
        identity.require_role(UserRole::Admin)?;
        Ok(Self(identity))
    }
}

async fn resolve_identity(parts: &Parts, state: &AppState) -> Result<Identity, AppError> {
    // Set by SessionManagerLayer
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthError::Unauthorized)?;

    let current: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let identity = state
        .auth()
        .authenticate(&Credential::Session(current.id))
        .await?;
    identity.require_active()?;

    set_sentry_user(&identity.user_id, None);
    Ok(identity)
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled first to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    identity: &Identity,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(
            session_keys::CURRENT_USER,
            CurrentUser {
                id: identity.user_id,
                email: identity.email.clone(),
                role: identity.role,
            },
        )
        .await
}

/// Clear the session (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
