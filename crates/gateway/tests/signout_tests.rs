mod common;

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{header, StatusCode};
use tower::ServiceExt;

use common::*;
use dashboard_gateway::app::build_router;
use dashboard_gateway::provider::Role;

fn cookies_with_session() -> String {
    format!(
        "{}; sb-testproj-auth-token-code-verifier=abc; theme=dark",
        session_cookie("user-token", Some("r1"), fresh_expiry())
    )
}

#[tokio::test]
async fn post_signout_revokes_purges_and_redirects() {
    let fake = FakeProvider::new();
    fake.add_user("user-token", "user@example.com", Some(Role::User));
    let app = build_router(test_state(&fake));
    let cookies = cookies_with_session();

    let response = app
        .oneshot(request("POST", "/auth/signout", Some(&cookies), Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    assert_eq!(fake.sign_out_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store, max-age=0"
    );
    assert!(removes(&response, COOKIE_NAME));
    assert!(removes(&response, "sb-testproj-auth-token-code-verifier"));
    assert!(!set_cookies(&response).iter().any(|c| c.starts_with("theme=")));
}

#[tokio::test]
async fn failed_provider_signout_keeps_cookies() {
    let fake = FakeProvider::new();
    fake.add_user("user-token", "user@example.com", Some(Role::User));
    fake.fail_sign_out.store(true, Ordering::SeqCst);
    let app = build_router(test_state(&fake));
    let cookies = cookies_with_session();

    let response = app
        .oneshot(request("POST", "/auth/signout", Some(&cookies), Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&response).is_empty());
    let body = body_json(response).await;
    assert_eq!(body["error"], "Sign out failed");
}

#[tokio::test]
async fn post_signout_without_session_still_purges() {
    let fake = FakeProvider::new();
    let app = build_router(test_state(&fake));

    let response = app
        .oneshot(request(
            "POST",
            "/auth/signout",
            Some("sb-testproj-auth-token-code-verifier=abc"),
            Body::empty(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(fake.sign_out_calls.load(Ordering::SeqCst), 0);
    assert!(removes(&response, "sb-testproj-auth-token-code-verifier"));
}

#[tokio::test]
async fn get_signout_only_redirects() {
    let fake = FakeProvider::new();
    fake.add_user("user-token", "user@example.com", Some(Role::User));
    let app = build_router(test_state(&fake));
    let cookies = cookies_with_session();

    let response = app.oneshot(get("/auth/signout", Some(&cookies))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    assert_eq!(fake.sign_out_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fake.provider_calls(), 0);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn post_signout_with_trailing_slash_signs_out() {
    let fake = FakeProvider::new();
    fake.add_user("user-token", "user@example.com", Some(Role::User));
    let app = build_router(test_state(&fake));
    let cookies = cookies_with_session();

    let response = app
        .oneshot(request("POST", "/auth/signout/", Some(&cookies), Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    assert_eq!(fake.sign_out_calls.load(Ordering::SeqCst), 1);
    assert!(removes(&response, COOKIE_NAME));
}
