//! Boundary to the hosted auth/database service.
//!
//! The gate and the API handlers only see the two traits below. The
//! production implementation is [`supabase::SupabaseClient`]; tests plug in
//! in-memory fakes.

pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{GateError, GateResult};

pub use supabase::SupabaseClient;

/// Authenticated user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Token pair issued at sign-in or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds from issue
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry, unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub user: Option<UserIdentity>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    /// Absolute expiry, derived from `expires_in` when the provider omits `expires_at`.
    pub fn expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.or_else(|| self.expires_in.map(|secs| now + secs))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Lenient read of a stored role: anything but `admin` is `User`.
    pub fn from_stored(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse, used when an admin writes a role.
impl std::str::FromStr for Role {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(GateError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Role::from_stored).unwrap_or_default())
    }
}

/// Row of the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token is not (or no longer) valid.
    async fn get_user(&self, access_token: &str) -> GateResult<Option<UserIdentity>>;

    /// Exchange a refresh token for a rotated session.
    /// `Ok(None)` when the refresh token was rejected.
    async fn refresh_session(&self, refresh_token: &str) -> GateResult<Option<AuthSession>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GateResult<AuthSession>;

    /// Revoke the session. An already-invalid session counts as signed out.
    async fn sign_out(&self, access_token: &str) -> GateResult<()>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> GateResult<()>;

    async fn update_password(&self, access_token: &str, password: &str) -> GateResult<UserIdentity>;
}

/// Reads run with the caller's access token so row-level security applies.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_role(&self, access_token: &str, user_id: Uuid) -> GateResult<Option<Role>>;

    async fn get_profile(&self, access_token: &str, user_id: Uuid) -> GateResult<Option<Profile>>;

    /// All profiles, newest first.
    async fn list_profiles(&self, access_token: &str) -> GateResult<Vec<Profile>>;

    async fn update_full_name(&self, access_token: &str, user_id: Uuid, full_name: &str) -> GateResult<Profile>;

    async fn update_role(&self, access_token: &str, user_id: Uuid, role: Role) -> GateResult<Profile>;
}
