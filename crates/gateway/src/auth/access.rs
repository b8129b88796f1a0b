//! Access resolution and the gate's decision table.
//!
//! [`resolve_access`] is the only place that turns request cookies into an
//! [`AccessContext`]. The page gate feeds it into [`decide`]; API handlers
//! consume it through the [`RequireUser`] / [`RequireAdmin`] extractors.
//! Every failed or slow lookup degrades to the least-privileged outcome.

use std::future::Future;
use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use super::types::AccessContext;
use crate::error::{GateError, GateResult};
use crate::provider::{Role, UserIdentity};
use crate::result_ext::ResultExt;
use crate::routes::{RouteClass, RouteTable};
use crate::session_cookie::{CookieSession, StoredSession};
use crate::state::GateState;

/// What the gate does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

/// Cookie change to apply to the outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub enum CookieUpdate {
    Keep,
    /// Tokens were rotated by a refresh
    Rotate(StoredSession),
    /// Session cookie is unusable
    Clear,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub context: AccessContext,
    pub cookie: CookieUpdate,
}

impl Resolution {
    fn anonymous(cookie: CookieUpdate) -> Self {
        Self {
            context: AccessContext::anonymous(),
            cookie,
        }
    }

    /// Write the cookie update onto a jar.
    pub fn apply(&self, state: &GateState, jar: CookieJar) -> CookieJar {
        match &self.cookie {
            CookieUpdate::Keep => jar,
            CookieUpdate::Rotate(session) => state.cookies.write(jar, session),
            CookieUpdate::Clear => state.cookies.clear(jar),
        }
    }
}

/// Run an external lookup under the gate's time budget.
pub async fn bounded<T, F>(budget: Duration, what: &str, fut: F) -> GateResult<T>
where
    F: Future<Output = GateResult<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(GateError::Timeout(format!("{} exceeded {}ms", what, budget.as_millis()))),
    }
}

/// Resolve who is calling from the session cookie: user lookup (refreshing
/// an expired token first), then role lookup.
pub async fn resolve_access(state: &GateState, jar: &CookieJar) -> Resolution {
    let stored = match state.cookies.read(jar) {
        CookieSession::Missing => return Resolution::anonymous(CookieUpdate::Keep),
        CookieSession::Invalid => {
            tracing::debug!(cookie = state.cookies.name(), "Undecodable session cookie");
            return Resolution::anonymous(CookieUpdate::Clear);
        }
        CookieSession::Present(stored) => stored,
    };

    let now = chrono::Utc::now().timestamp();
    let (user, session, cookie) = if stored.is_expired(now) {
        match refresh(state, &stored, now).await {
            Refreshed::Ok(user, session) => {
                let cookie = CookieUpdate::Rotate(session.clone());
                (user, session, cookie)
            }
            Refreshed::Rejected => return Resolution::anonymous(CookieUpdate::Clear),
            Refreshed::Failed => return Resolution::anonymous(CookieUpdate::Keep),
        }
    } else {
        let looked_up = bounded(
            state.lookup_timeout(),
            "get_user",
            state.identity.get_user(&stored.access_token),
        )
        .await
        .log_warn("User lookup failed, treating request as unauthenticated");

        match looked_up {
            Ok(Some(user)) => (user, stored, CookieUpdate::Keep),
            // Revoked or expired without a recorded expiry: one refresh attempt
            Ok(None) => match refresh(state, &stored, now).await {
                Refreshed::Ok(user, session) => {
                    let cookie = CookieUpdate::Rotate(session.clone());
                    (user, session, cookie)
                }
                Refreshed::Rejected => return Resolution::anonymous(CookieUpdate::Clear),
                Refreshed::Failed => return Resolution::anonymous(CookieUpdate::Keep),
            },
            Err(_) => return Resolution::anonymous(CookieUpdate::Keep),
        }
    };

    let role = resolve_role(state, &session.access_token, user.id).await;

    Resolution {
        context: AccessContext {
            user: Some(user),
            role,
            access_token: Some(session.access_token),
        },
        cookie,
    }
}

enum Refreshed {
    Ok(UserIdentity, StoredSession),
    /// Provider refused the refresh token; the session is over
    Rejected,
    /// Transient failure; leave the cookie alone
    Failed,
}

async fn refresh(state: &GateState, stored: &StoredSession, now: i64) -> Refreshed {
    let Some(refresh_token) = stored.refresh_token.as_deref() else {
        return Refreshed::Rejected;
    };

    let refreshed = bounded(
        state.lookup_timeout(),
        "refresh_session",
        state.identity.refresh_session(refresh_token),
    )
    .await
    .log_warn("Session refresh failed, treating request as unauthenticated");

    let auth_session = match refreshed {
        Ok(Some(session)) => session,
        Ok(None) => return Refreshed::Rejected,
        Err(_) => return Refreshed::Failed,
    };
    let session = StoredSession::from_auth_session(&auth_session, now);

    let user = match auth_session.user {
        Some(user) => Some(user),
        None => bounded(
            state.lookup_timeout(),
            "get_user",
            state.identity.get_user(&session.access_token),
        )
        .await
        .log_warn("User lookup after refresh failed")
        .ok()
        .flatten(),
    };

    match user {
        Some(user) => {
            tracing::debug!(user_id = %user.id, "Session refreshed");
            Refreshed::Ok(user, session)
        }
        None => Refreshed::Failed,
    }
}

/// Role from the profile store; a missing row or failed lookup is `User`.
pub async fn resolve_role(state: &GateState, access_token: &str, user_id: Uuid) -> Role {
    let looked_up = bounded(
        state.lookup_timeout(),
        "get_role",
        state.profiles.get_role(access_token, user_id),
    )
    .await
    .log_warn("Role lookup failed, defaulting to user");

    match looked_up {
        Ok(Some(role)) => role,
        Ok(None) => {
            tracing::debug!(user_id = %user_id, "No profile row, defaulting to user");
            Role::User
        }
        Err(_) => Role::User,
    }
}

/// The gate's decision table; first match wins.
pub fn decide(routes: &RouteTable, class: RouteClass, ctx: &AccessContext) -> Decision {
    if !ctx.is_authenticated() {
        return if class.is_protected() {
            Decision::Redirect(routes.login_path().to_string())
        } else {
            Decision::Allow
        };
    }

    let landing = if ctx.role.is_admin() {
        routes.admin_landing()
    } else {
        routes.user_landing()
    };

    match class {
        RouteClass::SignOut | RouteClass::Recovery => Decision::Allow,
        RouteClass::Auth | RouteClass::Root => Decision::Redirect(landing.to_string()),
        RouteClass::Admin if !ctx.role.is_admin() => Decision::Redirect(routes.user_landing().to_string()),
        RouteClass::User if ctx.role.is_admin() => Decision::Redirect(routes.admin_landing().to_string()),
        _ => Decision::Allow,
    }
}

/// Authenticated caller, as seen by API handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserIdentity,
    pub role: Role,
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    User,
    Admin,
}

/// Single authorization check used by every guarded handler.
pub fn authorize(ctx: &AccessContext, requirement: Requirement) -> GateResult<CurrentUser> {
    let (Some(user), Some(access_token)) = (ctx.user.clone(), ctx.access_token.clone()) else {
        return Err(GateError::Unauthenticated);
    };
    if requirement == Requirement::Admin && !ctx.role.is_admin() {
        return Err(GateError::Forbidden("Admin access required".to_string()));
    }
    Ok(CurrentUser {
        user,
        role: ctx.role,
        access_token,
    })
}

fn context_from_parts(parts: &Parts) -> AccessContext {
    // No context means the session layer did not run: fail closed
    parts.extensions.get::<AccessContext>().cloned().unwrap_or_default()
}

/// Extractor: any authenticated user.
pub struct RequireUser(pub CurrentUser);

/// Extractor: authenticated admin.
pub struct RequireAdmin(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authorize(&context_from_parts(parts), Requirement::User).map(RequireUser)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authorize(&context_from_parts(parts), Requirement::Admin).map(RequireAdmin)
    }
}
