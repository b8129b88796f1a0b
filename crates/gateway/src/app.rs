//! Router assembly.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, middleware::{access_gate, api_session}};
use crate::error::expose_error_detail;
use crate::state::GateState;
use crate::{health, profiles, proxy};

/// Build the gateway router: local endpoints, the proxy fallback, and the
/// page gate wrapped around all of it.
pub fn build_router(state: Arc<GateState>) -> Router {
    // Credential and recovery endpoints work without a session
    let public_api = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/reset-password", post(auth::reset_password));

    let session_api = Router::new()
        .route("/api/auth/update-password", post(auth::update_password))
        .route("/api/profile", get(profiles::get_profile).patch(profiles::update_profile))
        .route("/api/admin/users", get(profiles::list_users))
        .route("/api/admin/users/{id}/role", patch(profiles::set_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_session));

    let signout_path = state.routes.signout_path().to_string();
    let signout = get(auth::sign_out_redirect).post(auth::sign_out);

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route(&signout_path, signout.clone())
        .route(&format!("{}/", signout_path), signout)
        .merge(public_api)
        .merge(session_api)
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(state.clone(), access_gate));

    if state.config.is_development() {
        app = app.layer(middleware::from_fn(expose_error_detail));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state))
        .with_state(state)
}

fn cors_layer(state: &GateState) -> CorsLayer {
    let cors = &state.config.cors;
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    tracing::info!("CORS allowed origins: {}", state.config.cors_origins_string());

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(cors.allow_credentials)
}
