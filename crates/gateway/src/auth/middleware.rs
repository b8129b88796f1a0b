use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use super::access::{decide, resolve_access, Decision};
use crate::routes::RouteClass;
use crate::state::GateState;

/// Page gate: allow, send to login, or send to the caller's landing area.
///
/// Excluded paths pass straight through. Rotated or cleared session cookies
/// are written onto whatever response goes out, redirect or not.
pub async fn access_gate(
    State(state): State<Arc<GateState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if state.routes.is_excluded(&path) {
        return next.run(request).await;
    }

    let class = state.routes.classify(&path);

    // Sign-out is allowed in every state and must not rotate the session it ends
    if class == RouteClass::SignOut {
        tracing::debug!(path = %path, "Gate: sign-out endpoint, allow");
        return next.run(request).await;
    }

    let resolution = resolve_access(&state, &jar).await;
    let decision = decide(&state.routes, class, &resolution.context);
    let jar = resolution.apply(&state, jar);

    tracing::debug!(
        path = %path,
        class = ?class,
        authenticated = resolution.context.is_authenticated(),
        role = %resolution.context.role,
        decision = ?decision,
        "Gate decision"
    );

    match decision {
        Decision::Redirect(target) => (jar, Redirect::temporary(&target)).into_response(),
        Decision::Allow => {
            request.extensions_mut().insert(resolution.context);
            let response = next.run(request).await;
            (jar, response).into_response()
        }
    }
}

/// API session layer: resolves the caller for `RequireUser`/`RequireAdmin`
/// without redirecting, and keeps rotated cookies.
pub async fn api_session(
    State(state): State<Arc<GateState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let resolution = resolve_access(&state, &jar).await;
    let jar = resolution.apply(&state, jar);

    request.extensions_mut().insert(resolution.context);
    let response = next.run(request).await;
    (jar, response).into_response()
}
