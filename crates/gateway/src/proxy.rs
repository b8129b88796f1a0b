//! Transparent proxy to the dashboard renderer.
//!
//! Requests the gate allowed and no local route handles are forwarded:
//!
//! 1. The gateway only decides who may see which page
//! 2. Pages are rendered upstream, unchanged
//! 3. Identity travels as `x-user-id`, `x-user-email` and `x-user-role`
//!
//! Usage:
//! - `/*path` - Forwards to `{UPSTREAM_BASE_URL}/*path`

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::auth::types::AccessContext;
use crate::error::GateError;
use crate::state::GateState;

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const IDENTITY_HEADERS: [&str; 3] = ["x-user-id", "x-user-email", "x-user-role"];

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fallback handler: forward to the upstream renderer.
pub async fn forward(State(state): State<Arc<GateState>>, req: Request) -> Response {
    match forward_request(&state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward_request(state: &GateState, req: Request) -> Result<Response, GateError> {
    let base = state.config.upstream.base_url.trim_end_matches('/');
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let full_url = format!("{}{}", base, path_and_query);
    let method = req.method().clone();

    tracing::debug!(target_url = %full_url, method = %method, "Proxying request upstream");

    let context = req.extensions().get::<AccessContext>().cloned().unwrap_or_default();
    let headers = forwarded_headers(req.headers(), &context);

    let body = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| GateError::Validation(format!("Failed to read request body: {}", e)))?;

    let mut proxy_req = state.upstream.request(method, &full_url).headers(headers);
    if !body.is_empty() {
        proxy_req = proxy_req.body(body);
    }

    let proxy_response = proxy_req
        .send()
        .await
        .map_err(|e| GateError::Upstream(format!("Proxy request failed: {}", e)))?;

    let status = proxy_response.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in proxy_response.headers() {
        if !HOP_BY_HOP.contains(&name.as_str()) {
            response_headers.append(name.clone(), value.clone());
        }
    }

    let bytes = proxy_response
        .bytes()
        .await
        .map_err(|e| GateError::Upstream(format!("Failed to read response: {}", e)))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Headers passed upstream: content negotiation, cookies, client `x-*`
/// headers, and the identity resolved by the gate. Client-supplied identity
/// headers are dropped.
fn forwarded_headers(incoming: &HeaderMap, context: &AccessContext) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in incoming {
        let name_str = name.as_str();
        if IDENTITY_HEADERS.contains(&name_str) {
            continue;
        }
        let keep = name == header::COOKIE
            || name == header::CONTENT_TYPE
            || name == header::ACCEPT
            || name == header::ACCEPT_LANGUAGE
            || name == header::USER_AGENT
            || name_str.starts_with("x-");
        if keep {
            out.append(name.clone(), value.clone());
        }
    }

    if let Some(user) = &context.user {
        insert_identity(&mut out, "x-user-id", &user.id.to_string());
        if let Some(email) = &user.email {
            insert_identity(&mut out, "x-user-email", email);
        }
        insert_identity(&mut out, "x-user-role", context.role.as_str());
    }
    out
}

fn insert_identity(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => tracing::warn!("Skipping non-ASCII identity header {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Role, UserIdentity};
    use uuid::Uuid;

    #[test]
    fn test_forwarded_headers_strip_spoofed_identity() {
        let mut incoming = HeaderMap::new();
        incoming.insert("x-user-role", HeaderValue::from_static("admin"));
        incoming.insert("x-request-id", HeaderValue::from_static("abc"));
        incoming.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        incoming.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let out = forwarded_headers(&incoming, &AccessContext::anonymous());
        assert!(out.get("x-user-role").is_none());
        assert_eq!(out.get("x-request-id").unwrap(), "abc");
        assert_eq!(out.get(header::COOKIE).unwrap(), "theme=dark");
        assert!(out.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_forwarded_headers_carry_identity() {
        let id = Uuid::new_v4();
        let context = AccessContext {
            user: Some(UserIdentity {
                id,
                email: Some("ada@example.com".to_string()),
                created_at: None,
                last_sign_in_at: None,
            }),
            role: Role::Admin,
            access_token: Some("t".to_string()),
        };
        let out = forwarded_headers(&HeaderMap::new(), &context);
        assert_eq!(out.get("x-user-id").unwrap(), id.to_string().as_str());
        assert_eq!(out.get("x-user-email").unwrap(), "ada@example.com");
        assert_eq!(out.get("x-user-role").unwrap(), "admin");
    }
}
