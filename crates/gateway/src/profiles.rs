//! Profile endpoints backing the settings page and the admin user table.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::access::{RequireAdmin, RequireUser};
use crate::error::{GateError, GateResult};
use crate::provider::{Profile, Role};
use crate::result_ext::ResultExt;
use crate::state::GateState;

const MAX_FULL_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// `GET /api/profile`
pub async fn get_profile(
    RequireUser(current): RequireUser,
    State(state): State<Arc<GateState>>,
) -> GateResult<Json<Profile>> {
    let profile = state
        .profiles
        .get_profile(&current.access_token, current.user.id)
        .await
        .log("Profile read failed")?
        .ok_or_else(|| GateError::NotFound("profile".to_string()))?;
    Ok(Json(profile))
}

/// `PATCH /api/profile` - only `full_name` is writable by its owner.
pub async fn update_profile(
    RequireUser(current): RequireUser,
    State(state): State<Arc<GateState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> GateResult<Json<Profile>> {
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(GateError::Validation("Full name is required".to_string()));
    }
    if full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(GateError::Validation(format!(
            "Full name must be at most {} characters",
            MAX_FULL_NAME_LEN
        )));
    }

    let profile = state
        .profiles
        .update_full_name(&current.access_token, current.user.id, full_name)
        .await
        .log("Profile update failed")?;

    tracing::info!(user_id = %current.user.id, "Profile updated");
    Ok(Json(profile))
}

/// `GET /api/admin/users` - newest first.
pub async fn list_users(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<GateState>>,
) -> GateResult<Json<Vec<Profile>>> {
    let profiles = state
        .profiles
        .list_profiles(&admin.access_token)
        .await
        .log("Listing profiles failed")?;
    Ok(Json(profiles))
}

/// `PATCH /api/admin/users/{id}/role`
pub async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<GateState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> GateResult<Json<Profile>> {
    let role: Role = req.role.parse()?;

    let profile = state
        .profiles
        .update_role(&admin.access_token, user_id, role)
        .await
        .log("Role update failed")?;

    tracing::info!(admin_id = %admin.user.id, user_id = %user_id, role = %role, "Role changed");
    Ok(Json(profile))
}
