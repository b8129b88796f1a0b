//! Shared fixtures: an in-memory provider and request helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    middleware, Router,
};
use uuid::Uuid;

use dashboard_gateway::auth::middleware::access_gate;
use dashboard_gateway::config::GatewayConfig;
use dashboard_gateway::provider::{AuthSession, IdentityProvider, Profile, ProfileStore, Role, UserIdentity};
use dashboard_gateway::session_cookie::{encode, StoredSession};
use dashboard_gateway::state::GateState;
use dashboard_gateway::{GateError, GateResult};

pub const COOKIE_NAME: &str = "sb-testproj-auth-token";

/// Provider fake: tokens map to users, refresh tokens map to new sessions.
#[derive(Default)]
pub struct FakeProvider {
    users: Mutex<HashMap<String, UserIdentity>>,
    refreshes: Mutex<HashMap<String, String>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    pub fail_lookups: AtomicBool,
    pub fail_sign_out: AtomicBool,
    /// Role lookups error, independently of identity lookups
    pub fail_roles: AtomicBool,
    lookup_delay: Mutex<Option<Duration>>,
    role_delay: Mutex<Option<Duration>>,
    pub get_user_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub role_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a user reachable through `token`; `role: None` leaves no profile row.
    pub fn add_user(&self, token: &str, email: &str, role: Option<Role>) -> Uuid {
        let id = Uuid::new_v4();
        let user = UserIdentity {
            id,
            email: Some(email.to_string()),
            created_at: None,
            last_sign_in_at: None,
        };
        self.users.lock().unwrap().insert(token.to_string(), user);
        if let Some(role) = role {
            self.profiles.lock().unwrap().insert(
                id,
                Profile {
                    id,
                    email: Some(email.to_string()),
                    full_name: None,
                    role,
                    created_at: None,
                    updated_at: None,
                },
            );
        }
        id
    }

    /// `refresh_token` exchanges for `new_token`, which must already map to a user.
    pub fn add_refresh(&self, refresh_token: &str, new_token: &str) {
        self.refreshes
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), new_token.to_string());
    }

    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_role_delay(&self, delay: Duration) {
        *self.role_delay.lock().unwrap() = Some(delay);
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.lock().unwrap().get(&id).cloned()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn provider_calls(&self) -> usize {
        Self::calls(&self.get_user_calls) + Self::calls(&self.refresh_calls) + Self::calls(&self.role_calls)
    }

    async fn delay(&self) -> GateResult<()> {
        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(GateError::AuthLookupFailure("provider unavailable".to_string()));
        }
        Ok(())
    }

    fn user_for(&self, token: &str) -> Option<UserIdentity> {
        self.users.lock().unwrap().get(token).cloned()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_user(&self, access_token: &str) -> GateResult<Option<UserIdentity>> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await?;
        Ok(self.user_for(access_token))
    }

    async fn refresh_session(&self, refresh_token: &str) -> GateResult<Option<AuthSession>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await?;
        let new_token = self.refreshes.lock().unwrap().get(refresh_token).cloned();
        Ok(new_token.map(|token| AuthSession {
            user: self.user_for(&token),
            access_token: token,
            refresh_token: format!("{}-next", refresh_token),
            expires_in: Some(3600),
            expires_at: None,
            token_type: "bearer".to_string(),
        }))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GateResult<AuthSession> {
        let found = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(_, u)| u.email.as_deref() == Some(email))
            .map(|(token, user)| (token.clone(), user.clone()));
        match found {
            Some((token, user)) if password == "correct-horse" => Ok(AuthSession {
                access_token: token,
                refresh_token: "login-refresh".to_string(),
                expires_in: Some(3600),
                expires_at: None,
                token_type: "bearer".to_string(),
                user: Some(user),
            }),
            _ => Err(GateError::InvalidCredentials("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> GateResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(GateError::SignOutFailure("provider returned 500".to_string()));
        }
        Ok(())
    }

    async fn reset_password_for_email(&self, _email: &str, _redirect_to: &str) -> GateResult<()> {
        Ok(())
    }

    async fn update_password(&self, access_token: &str, _password: &str) -> GateResult<UserIdentity> {
        self.user_for(access_token).ok_or(GateError::Unauthenticated)
    }
}

#[async_trait]
impl ProfileStore for FakeProvider {
    async fn get_role(&self, _access_token: &str, user_id: Uuid) -> GateResult<Option<Role>> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.role_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(GateError::ProfileLookupFailure("profiles unavailable".to_string()));
        }
        Ok(self.profiles.lock().unwrap().get(&user_id).map(|p| p.role))
    }

    async fn get_profile(&self, _access_token: &str, user_id: Uuid) -> GateResult<Option<Profile>> {
        Ok(self.profile(user_id))
    }

    async fn list_profiles(&self, _access_token: &str) -> GateResult<Vec<Profile>> {
        Ok(self.profiles.lock().unwrap().values().cloned().collect())
    }

    async fn update_full_name(&self, _access_token: &str, user_id: Uuid, full_name: &str) -> GateResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| GateError::NotFound("profile".to_string()))?;
        profile.full_name = Some(full_name.to_string());
        Ok(profile.clone())
    }

    async fn update_role(&self, _access_token: &str, user_id: Uuid, role: Role) -> GateResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| GateError::NotFound("profile".to_string()))?;
        profile.role = role;
        Ok(profile.clone())
    }
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.provider.url = "https://testproj.supabase.co".to_string();
    config.provider.anon_key = "anon-key".to_string();
    config.upstream.base_url = "http://127.0.0.1:9".to_string();
    config.gate.lookup_timeout_ms = 200;
    config
}

pub fn test_state(fake: &Arc<FakeProvider>) -> Arc<GateState> {
    Arc::new(GateState::new(test_config(), fake.clone(), fake.clone()))
}

/// The page gate in front of a handler that always answers `page`.
pub fn gate_app(state: Arc<GateState>) -> Router {
    Router::new()
        .fallback(|| async { "page" })
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .with_state(state)
}

/// `Cookie` header value carrying a session for `token`.
pub fn session_cookie(token: &str, refresh_token: Option<&str>, expires_at: Option<i64>) -> String {
    let session = StoredSession {
        access_token: token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at,
        token_type: "bearer".to_string(),
    };
    format!("{}={}", COOKIE_NAME, encode(&session))
}

pub fn fresh_expiry() -> Option<i64> {
    Some(chrono::Utc::now().timestamp() + 3600)
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    request("GET", path, cookie, Body::empty())
}

pub fn request(method: &str, path: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(body).unwrap()
}

pub fn json_request(method: &str, path: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut req = request(method, path, cookie, Body::from(body.to_string()));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    req
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Set-Cookie headers that remove `name`.
pub fn removes(response: &Response<Body>, name: &str) -> bool {
    set_cookies(response).iter().any(|c| {
        c.starts_with(&format!("{}=", name)) && (c.contains("Max-Age=0") || c.contains("1970"))
    })
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
