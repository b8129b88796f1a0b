pub mod access;
pub mod middleware;
pub mod types;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{GateError, GateResult};
use crate::provider::{Role, UserIdentity};
use crate::result_ext::ResultExt;
use crate::session_cookie::{CookieSession, StoredSession};
use crate::state::GateState;
use access::{bounded, resolve_role, RequireUser};

/// Headers that keep sign-out responses out of every cache.
const NO_CACHE: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store, max-age=0"),
    (header::PRAGMA, "no-cache"),
];

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserIdentity,
    pub role: Role,
    /// Landing area for the role
    pub redirect_to: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// Login endpoint - password sign-in, sets the session cookie
pub async fn login(
    State(state): State<Arc<GateState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> GateResult<(CookieJar, Json<LoginResponse>)> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(GateError::Validation("Email and password are required".to_string()));
    }
    tracing::info!("Auth login request for: {}", email);

    let session = state.identity.sign_in_with_password(email, &req.password).await?;
    let now = chrono::Utc::now().timestamp();
    let stored = StoredSession::from_auth_session(&session, now);

    let user = match session.user {
        Some(user) => user,
        None => state
            .identity
            .get_user(&stored.access_token)
            .await
            .log("User lookup after sign-in failed")?
            .ok_or_else(|| GateError::Internal("Provider returned a session without a user".to_string()))?,
    };

    let role = resolve_role(&state, &stored.access_token, user.id).await;
    let redirect_to = if role.is_admin() {
        state.routes.admin_landing()
    } else {
        state.routes.user_landing()
    }
    .to_string();

    tracing::info!(user_id = %user.id, role = %role, "Auth login successful");

    let jar = state.cookies.write(jar, &stored);
    Ok((jar, Json(LoginResponse { user, role, redirect_to })))
}

/// Sends the password recovery email; the link lands on the update page.
pub async fn reset_password(
    State(state): State<Arc<GateState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> GateResult<Json<StatusResponse>> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(GateError::Validation("A valid email address is required".to_string()));
    }

    let redirect_to = state.config.recovery_redirect_url();
    state
        .identity
        .reset_password_for_email(email, &redirect_to)
        .await
        .log("Password reset request failed")?;

    tracing::info!("Password reset email requested");

    Ok(Json(StatusResponse {
        status: "sent".to_string(),
        message: "Check your email for a link to reset your password".to_string(),
        redirect_to: None,
    }))
}

pub async fn update_password(
    RequireUser(current): RequireUser,
    State(state): State<Arc<GateState>>,
    Json(req): Json<UpdatePasswordRequest>,
) -> GateResult<Json<StatusResponse>> {
    if req.password.is_empty() {
        return Err(GateError::Validation("Password is required".to_string()));
    }
    if req.password != req.confirm_password {
        return Err(GateError::Validation("Passwords do not match".to_string()));
    }

    state
        .identity
        .update_password(&current.access_token, &req.password)
        .await
        .log("Password update failed")?;

    tracing::info!(user_id = %current.user.id, "Password updated");

    Ok(Json(StatusResponse {
        status: "updated".to_string(),
        message: "Your password has been updated".to_string(),
        redirect_to: Some(state.routes.login_path().to_string()),
    }))
}

/// `POST` sign-out: revoke at the provider, purge provider cookies, redirect.
///
/// A provider failure is returned to the caller and nothing is purged, so
/// the sign-out can be retried.
pub async fn sign_out(State(state): State<Arc<GateState>>, jar: CookieJar) -> GateResult<Response> {
    if let CookieSession::Present(stored) = state.cookies.read(&jar) {
        bounded(
            state.lookup_timeout(),
            "sign_out",
            state.identity.sign_out(&stored.access_token),
        )
        .await
        .map_err(|e| match e {
            GateError::SignOutFailure(_) => e,
            other => GateError::SignOutFailure(other.to_string()),
        })
        .log("Provider sign-out failed")?;
    }

    let (jar, purged) = state.cookies.purge_namespace(jar);
    let jar = state.cookies.clear(jar);
    tracing::info!(purged = purged.len(), "Signed out");

    Ok((jar, NO_CACHE, Redirect::to(state.routes.login_path())).into_response())
}

/// `GET` sign-out: redirect only. Link prefetch or a bookmark must not end the session.
pub async fn sign_out_redirect(State(state): State<Arc<GateState>>) -> Response {
    (NO_CACHE, Redirect::to(state.routes.login_path())).into_response()
}
