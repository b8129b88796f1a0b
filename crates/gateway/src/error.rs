//! Error types for the dashboard gateway.
//!
//! `GateError` implements `IntoResponse` so handlers can return it directly.
//! Server-side failures answer with a generic message; the detailed text is
//! attached to the response as an [`ErrorDetail`] extension and only written
//! into the body by [`expose_error_detail`], which is layered in development.

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Error, Debug)]
pub enum GateError {
    /// Identity provider unreachable or errored while resolving the user
    #[error("Auth lookup failed: {0}")]
    AuthLookupFailure(String),

    /// Profile row lookup errored
    #[error("Profile lookup failed: {0}")]
    ProfileLookupFailure(String),

    /// Identity provider errored during sign-out
    #[error("Sign out failed: {0}")]
    SignOutFailure(String),

    /// Password sign-in rejected by the provider
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// External call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Upstream dashboard renderer failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using GateError.
pub type GateResult<T> = Result<T, GateError>;

/// Detailed error text carried on error responses.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::AuthLookupFailure(_) | GateError::ProfileLookupFailure(_) => StatusCode::BAD_GATEWAY,
            GateError::SignOutFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::InvalidCredentials(_) | GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::Forbidden(_) => StatusCode::FORBIDDEN,
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::Config(_) | GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show outside development.
    pub fn public_message(&self) -> String {
        match self {
            GateError::SignOutFailure(_) => "Sign out failed".to_string(),
            e if e.status().is_server_error() => GENERIC_MESSAGE.to_string(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorDetail(self.to_string()));
        response
    }
}

impl From<anyhow::Error> for GateError {
    fn from(err: anyhow::Error) -> Self {
        GateError::Internal(err.to_string())
    }
}

impl From<envy::Error> for GateError {
    fn from(err: envy::Error) -> Self {
        GateError::Config(err.to_string())
    }
}

/// Rewrites error bodies to include the detailed message. Development only.
pub async fn expose_error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let mut payload = match axum::body::to_bytes(body, 64 * 1024).await {
        Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes).unwrap_or_else(|_| json!({})),
        Err(_) => json!({}),
    };
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("detail".to_string(), json!(detail));
    }
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(payload.to_string()))
}
