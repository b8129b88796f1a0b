//! Session cookie contract shared with the dashboard client libraries.
//!
//! The session lives in `sb-<ref>-auth-token`. The value is JSON, optionally
//! prefixed with `base64-` and base64 encoded, and may be split across
//! `<name>.0`, `<name>.1`, ... when it outgrows a single cookie. The legacy
//! array form `[access_token, refresh_token, ...]` is still accepted.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::config::GatewayConfig;
use crate::provider::AuthSession;

const BASE64_PREFIX: &str = "base64-";
/// Refresh this many seconds before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;
/// Chunk indices tried when reading a split cookie.
const MAX_CHUNKS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl StoredSession {
    pub fn from_auth_session(session: &AuthSession, now: i64) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: Some(session.refresh_token.clone()).filter(|t| !t.is_empty()),
            expires_at: session.expiry(now),
            token_type: session.token_type.clone(),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at
            .map(|at| at <= now + EXPIRY_MARGIN_SECS)
            .unwrap_or(false)
    }
}

/// Outcome of reading the session cookie.
#[derive(Debug, Clone, PartialEq)]
pub enum CookieSession {
    Missing,
    /// Present but undecodable
    Invalid,
    Present(StoredSession),
}

#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    namespace_prefix: String,
    secure: bool,
    max_age: Duration,
}

impl SessionCookies {
    pub fn new(name: impl Into<String>, namespace_prefix: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            namespace_prefix: namespace_prefix.into(),
            secure,
            max_age: Duration::days(400),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.session_cookie_name(),
            config.cookies.namespace_prefix.clone(),
            config.secure_cookies(),
        )
        .with_max_age(Duration::seconds(config.cookies.max_age_secs))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self, jar: &CookieJar) -> CookieSession {
        match self.raw_value(jar) {
            None => CookieSession::Missing,
            Some(raw) => match decode(&raw) {
                Some(session) => CookieSession::Present(session),
                None => CookieSession::Invalid,
            },
        }
    }

    /// Single cookie value, or the concatenation of its chunks in order.
    fn raw_value(&self, jar: &CookieJar) -> Option<String> {
        if let Some(cookie) = jar.get(&self.name) {
            return Some(cookie.value().to_string());
        }
        let mut joined = String::new();
        for index in 0..MAX_CHUNKS {
            match jar.get(&chunk_name(&self.name, index)) {
                Some(chunk) => joined.push_str(chunk.value()),
                None => break,
            }
        }
        Some(joined).filter(|v| !v.is_empty())
    }

    /// Store the session as a single persistent cookie, dropping any old chunks.
    pub fn write(&self, jar: CookieJar, session: &StoredSession) -> CookieJar {
        let mut jar = self.remove_chunks(jar);
        let value = encode(session);
        let cookie = Cookie::build((self.name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(self.max_age);
        jar = jar.add(cookie);
        jar
    }

    /// Remove the session cookie and its chunks.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let jar = self.remove_chunks(jar);
        jar.remove(Cookie::build(self.name.clone()).path("/"))
    }

    fn remove_chunks(&self, mut jar: CookieJar) -> CookieJar {
        let chunks: Vec<String> = jar
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| is_chunk_of(name, &self.name))
            .collect();
        for name in chunks {
            jar = jar.remove(Cookie::build(name).path("/"));
        }
        jar
    }

    /// Remove every cookie in the provider namespace. Returns the removed names.
    pub fn purge_namespace(&self, mut jar: CookieJar) -> (CookieJar, Vec<String>) {
        let names: Vec<String> = jar
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| name.starts_with(&self.namespace_prefix))
            .collect();
        for name in &names {
            jar = jar.remove(Cookie::build(name.clone()).path("/"));
        }
        (jar, names)
    }
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{}.{}", name, index)
}

fn is_chunk_of(candidate: &str, name: &str) -> bool {
    candidate
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub fn encode(session: &StoredSession) -> String {
    // StoredSession has only string/number fields; serialization cannot fail
    let json = serde_json::to_vec(session).unwrap_or_default();
    format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json))
}

pub fn decode(raw: &str) -> Option<StoredSession> {
    let raw = raw.trim();
    let json: Vec<u8> = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(encoded).ok())?,
        None => raw.as_bytes().to_vec(),
    };

    let value: serde_json::Value = serde_json::from_slice(&json).ok()?;
    match value {
        serde_json::Value::Array(items) => {
            let access_token = items.first()?.as_str()?.to_string();
            let refresh_token = items.get(1).and_then(|v| v.as_str()).map(|s| s.to_string());
            Some(StoredSession {
                access_token,
                refresh_token,
                expires_at: None,
                token_type: default_token_type(),
            })
        }
        obj @ serde_json::Value::Object(_) => {
            let session: StoredSession = serde_json::from_value(obj).ok()?;
            Some(session).filter(|s| !s.access_token.is_empty())
        }
        _ => None,
    }
}
