//! HTTP client for the hosted auth (GoTrue) and table (PostgREST) APIs.
//!
//! Every request carries the project's `apikey`; authenticated requests add
//! the user's access token as a bearer token so that the provider's
//! row-level security decides what the caller may read or write.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use super::{AuthSession, IdentityProvider, Profile, ProfileStore, Role, UserIdentity};
use crate::config::ProviderConfig;
use crate::error::{GateError, GateResult};

const PROFILES_TABLE: &str = "profiles";

#[derive(Clone, Debug)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_key(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
    }

    fn with_token(&self, req: RequestBuilder, access_token: &str) -> RequestBuilder {
        self.with_key(req).bearer_auth(access_token)
    }
}

/// Send and read the body as text; transport failures go through `on_error`.
async fn send(
    req: RequestBuilder,
    what: &str,
    on_error: fn(String) -> GateError,
) -> GateResult<(StatusCode, String)> {
    let res = req.send().await.map_err(|e| {
        if e.is_timeout() {
            GateError::Timeout(format!("{}: {}", what, e))
        } else {
            on_error(format!("{}: {}", what, e))
        }
    })?;
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Ok((status, body))
}

fn parse<T: serde::de::DeserializeOwned>(
    body: &str,
    what: &str,
    on_error: fn(String) -> GateError,
) -> GateResult<T> {
    serde_json::from_str(body).map_err(|e| on_error(format!("{}: invalid response: {}", what, e)))
}

/// Best human-readable message in a provider error body.
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn failure(what: &str, status: StatusCode, body: &str) -> String {
    format!(
        "{} failed: {} - {}",
        what,
        status,
        provider_message(body).unwrap_or_else(|| body.to_string())
    )
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(default)]
    role: Role,
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_user(&self, access_token: &str) -> GateResult<Option<UserIdentity>> {
        let req = self.with_token(self.http.get(self.auth_url("user")), access_token);
        let (status, body) = send(req, "get_user", GateError::AuthLookupFailure).await?;

        match status {
            s if s.is_success() => Ok(Some(parse(&body, "get_user", GateError::AuthLookupFailure)?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!(status = %status, "Access token rejected by provider");
                Ok(None)
            }
            s => Err(GateError::AuthLookupFailure(failure("get_user", s, &body))),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> GateResult<Option<AuthSession>> {
        let req = self
            .with_key(self.http.post(self.auth_url("token")))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let (status, body) = send(req, "refresh_session", GateError::AuthLookupFailure).await?;

        match status {
            s if s.is_success() => Ok(Some(parse(&body, "refresh_session", GateError::AuthLookupFailure)?)),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(status = %status, "Refresh token rejected by provider");
                Ok(None)
            }
            s => Err(GateError::AuthLookupFailure(failure("refresh_session", s, &body))),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GateResult<AuthSession> {
        let req = self
            .with_key(self.http.post(self.auth_url("token")))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = send(req, "sign_in", GateError::AuthLookupFailure).await?;

        match status {
            s if s.is_success() => parse(&body, "sign_in", GateError::AuthLookupFailure),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(GateError::InvalidCredentials(
                    provider_message(&body).unwrap_or_else(|| "Invalid login credentials".to_string()),
                ))
            }
            s => Err(GateError::AuthLookupFailure(failure("sign_in", s, &body))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> GateResult<()> {
        let req = self.with_token(self.http.post(self.auth_url("logout")), access_token);
        let (status, body) = send(req, "sign_out", GateError::SignOutFailure).await?;

        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!(status = %status, "Session already invalid at sign-out");
                Ok(())
            }
            s => Err(GateError::SignOutFailure(failure("sign_out", s, &body))),
        }
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> GateResult<()> {
        let req = self
            .with_key(self.http.post(self.auth_url("recover")))
            .query(&[("redirect_to", redirect_to)])
            .json(&serde_json::json!({ "email": email }));
        let (status, body) = send(req, "recover", GateError::Internal).await?;

        match status {
            s if s.is_success() => Ok(()),
            s if s.is_client_error() => Err(GateError::Validation(
                provider_message(&body).unwrap_or_else(|| "Password reset request rejected".to_string()),
            )),
            s => Err(GateError::Internal(failure("recover", s, &body))),
        }
    }

    async fn update_password(&self, access_token: &str, password: &str) -> GateResult<UserIdentity> {
        let req = self
            .with_token(self.http.put(self.auth_url("user")), access_token)
            .json(&serde_json::json!({ "password": password }));
        let (status, body) = send(req, "update_password", GateError::Internal).await?;

        match status {
            s if s.is_success() => parse(&body, "update_password", GateError::Internal),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GateError::Unauthenticated),
            s if s.is_client_error() => Err(GateError::Validation(
                provider_message(&body).unwrap_or_else(|| "Password update rejected".to_string()),
            )),
            s => Err(GateError::Internal(failure("update_password", s, &body))),
        }
    }
}

impl SupabaseClient {
    async fn patch_profile(
        &self,
        access_token: &str,
        user_id: Uuid,
        changes: serde_json::Value,
    ) -> GateResult<Profile> {
        let req = self
            .with_token(self.http.patch(self.rest_url(PROFILES_TABLE)), access_token)
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=representation")
            .json(&changes);
        let (status, body) = send(req, "update_profile", GateError::ProfileLookupFailure).await?;

        let rows: Vec<Profile> = match status {
            s if s.is_success() => parse(&body, "update_profile", GateError::ProfileLookupFailure)?,
            s => return Err(table_error("update_profile", s, &body)),
        };
        // Zero rows: no such profile, or row-level security hid it
        rows.into_iter()
            .next()
            .ok_or_else(|| GateError::NotFound(format!("profile {}", user_id)))
    }
}

fn table_error(what: &str, status: StatusCode, body: &str) -> GateError {
    match status {
        StatusCode::UNAUTHORIZED => GateError::Unauthenticated,
        StatusCode::FORBIDDEN => GateError::Forbidden(failure(what, status, body)),
        s => GateError::ProfileLookupFailure(failure(what, s, body)),
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_role(&self, access_token: &str, user_id: Uuid) -> GateResult<Option<Role>> {
        let req = self
            .with_token(self.http.get(self.rest_url(PROFILES_TABLE)), access_token)
            .query(&[("select", "role".to_string()), ("id", format!("eq.{}", user_id))]);
        let (status, body) = send(req, "get_role", GateError::ProfileLookupFailure).await?;

        if !status.is_success() {
            return Err(table_error("get_role", status, &body));
        }
        let rows: Vec<RoleRow> = parse(&body, "get_role", GateError::ProfileLookupFailure)?;
        Ok(rows.into_iter().next().map(|row| row.role))
    }

    async fn get_profile(&self, access_token: &str, user_id: Uuid) -> GateResult<Option<Profile>> {
        let req = self
            .with_token(self.http.get(self.rest_url(PROFILES_TABLE)), access_token)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))]);
        let (status, body) = send(req, "get_profile", GateError::ProfileLookupFailure).await?;

        if !status.is_success() {
            return Err(table_error("get_profile", status, &body));
        }
        let rows: Vec<Profile> = parse(&body, "get_profile", GateError::ProfileLookupFailure)?;
        Ok(rows.into_iter().next())
    }

    async fn list_profiles(&self, access_token: &str) -> GateResult<Vec<Profile>> {
        let req = self
            .with_token(self.http.get(self.rest_url(PROFILES_TABLE)), access_token)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let (status, body) = send(req, "list_profiles", GateError::ProfileLookupFailure).await?;

        if !status.is_success() {
            return Err(table_error("list_profiles", status, &body));
        }
        parse(&body, "list_profiles", GateError::ProfileLookupFailure)
    }

    async fn update_full_name(&self, access_token: &str, user_id: Uuid, full_name: &str) -> GateResult<Profile> {
        let changes = serde_json::json!({
            "full_name": full_name,
            "updated_at": chrono::Utc::now(),
        });
        self.patch_profile(access_token, user_id, changes).await
    }

    async fn update_role(&self, access_token: &str, user_id: Uuid, role: Role) -> GateResult<Profile> {
        let changes = serde_json::json!({
            "role": role.as_str(),
            "updated_at": chrono::Utc::now(),
        });
        self.patch_profile(access_token, user_id, changes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = SupabaseClient::new(&ProviderConfig {
            url: "https://proj.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(client.base_url(), "https://proj.supabase.co");
        assert_eq!(client.auth_url("user"), "https://proj.supabase.co/auth/v1/user");
        assert_eq!(client.rest_url("profiles"), "https://proj.supabase.co/rest/v1/profiles");
    }

    #[test]
    fn test_provider_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(provider_message(body).as_deref(), Some("Invalid login credentials"));
        assert_eq!(provider_message(r#"{"msg":"Email rate limit exceeded"}"#).as_deref(), Some("Email rate limit exceeded"));
        assert_eq!(provider_message("not json"), None);
    }

    #[test]
    fn test_table_error_mapping() {
        assert!(matches!(table_error("x", StatusCode::UNAUTHORIZED, ""), GateError::Unauthenticated));
        assert!(matches!(table_error("x", StatusCode::FORBIDDEN, ""), GateError::Forbidden(_)));
        assert!(matches!(
            table_error("x", StatusCode::INTERNAL_SERVER_ERROR, ""),
            GateError::ProfileLookupFailure(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_lookup_failure() {
        let client = SupabaseClient::new(&ProviderConfig {
            url: "http://127.0.0.1:1".to_string(),
            anon_key: "anon".to_string(),
            timeout_secs: 2,
        });
        let err = client.get_user("token").await.unwrap_err();
        assert!(matches!(err, GateError::AuthLookupFailure(_) | GateError::Timeout(_)));
        let err = client.sign_out("token").await.unwrap_err();
        assert!(matches!(err, GateError::SignOutFailure(_) | GateError::Timeout(_)));
    }
}
