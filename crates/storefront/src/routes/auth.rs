//! Account routes: sign-up, sign-in/out, password reset, current identity.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use cartwright_core::UserRole;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::User;
use crate::services::auth::Identity;
use crate::state::AppState;

/// Sign-up request body.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Forgot-password request body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Reset-password request body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

const RESET_REQUESTED: &str = "If the account exists, a reset link has been sent";

/// POST /auth/signup
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state
        .auth()
        .sign_up(&req.name, &req.email, &req.password, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Identity>> {
    let identity = state
        .auth()
        .sign_in(&req.email, &req.password, req.role)
        .await?;
    set_current_user(&session, &identity).await?;

    tracing::info!(user_id = %identity.user_id, role = %identity.role, "signed in");
    Ok(Json(identity))
}

/// POST /auth/signout
pub async fn sign_out(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/forgot-password
///
/// Answers identically whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some((user, token)) = state.auth().forgot_password(&req.email, req.role).await? {
        state
            .mailer()
            .send_password_reset(&user.email, &token, user.role)
            .await?;
    }
    Ok(Json(MessageResponse {
        message: RESET_REQUESTED,
    }))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth()
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

/// GET /auth/me
pub async fn me(RequireUser(identity): RequireUser) -> Json<Identity> {
    Json(identity)
}
