//! Sign-in, registration, sign-out and the session gate.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use azmotos_storefront::supabase::tables;

use azmotos_integration_tests::{
    FakeGateway, MEMBER_EMAIL, TestApp, body_text, location, session_cookie,
};

#[tokio::test]
async fn test_protected_page_redirects_to_login() {
    let app = TestApp::with_member();

    for path in ["/", "/catalog", "/motorcycle/6f1c7a52-2b0e-4d8c-9a43-1e2f3a4b5c6d", "/contact"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(response.headers()), Some("/auth/login"), "{path}");
    }
    assert_eq!(app.gateway.calls().query_rows, 0);
    assert_eq!(app.gateway.calls().get_row_by_id, 0);
}

#[tokio::test]
async fn test_htmx_request_gets_client_redirect() {
    let app = TestApp::with_member();

    let response = app.get_htmx("/catalog/results?brand=BMW", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-redirect"], "/auth/login");
}

#[tokio::test]
async fn test_sign_in_opens_the_catalog() {
    let app = TestApp::with_member();

    let cookie = app.sign_in_member().await;
    let response = app.get("/catalog", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("BMW R 1250 GS Adventure"));
    assert!(body.contains("Ducati Panigale V4"));
    assert!(body.contains("Sign out"));
}

#[tokio::test]
async fn test_signed_in_visitor_skips_login_page() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let response = app.get("/auth/login", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/catalog"));
}

#[tokio::test]
async fn test_wrong_password_shows_message() {
    let app = TestApp::with_member();

    let body = format!("email={}&password=nope", azmotos_integration_tests::encode(MEMBER_EMAIL));
    let response = app.post_form("/auth/login", &body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(response.headers()).is_none());
    assert!(body_text(response).await.contains("Invalid email or password."));
}

#[tokio::test]
async fn test_register_creates_account_and_profile() {
    let app = TestApp::new(FakeGateway::new());

    let response = app
        .post_form(
            "/auth/register",
            "email=New%40Azmotos.kz&password=secret1&password_confirm=secret1&full_name=Aidar+S&phone=%2B77000000000",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/catalog"));
    assert!(session_cookie(response.headers()).is_some());

    assert!(app.gateway.has_user("new@azmotos.kz"));
    let profiles = app.gateway.rows("profiles");
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["full_name"], "Aidar S");
    assert_eq!(profiles[0]["email"], "new@azmotos.kz");
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords_without_calling_backend() {
    let app = TestApp::new(FakeGateway::new());

    let response = app
        .post_form(
            "/auth/register",
            "email=new%40azmotos.kz&password=secret1&password_confirm=secret2",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Passwords do not match"));
    assert_eq!(app.gateway.calls().sign_up, 0);
}

#[tokio::test]
async fn test_register_with_confirmation_sends_to_login() {
    let gateway = FakeGateway::new();
    gateway.require_email_confirmation(true);
    let app = TestApp::new(gateway);

    let response = app
        .post_form(
            "/auth/register",
            "email=new%40azmotos.kz&password=secret1&password_confirm=secret1",
            None,
        )
        .await;
    assert_eq!(
        location(response.headers()),
        Some("/auth/login?success=confirm_email")
    );

    let response = app.get("/auth/login?success=confirm_email", None).await;
    assert!(body_text(response).await.contains("Check your email"));
}

#[tokio::test]
async fn test_register_rate_limited_asks_to_wait() {
    let gateway = FakeGateway::new();
    gateway.rate_limit_sign_ups(1);
    let app = TestApp::new(gateway);

    let response = app
        .post_form(
            "/auth/register",
            "email=new%40azmotos.kz&password=secret1&password_confirm=secret1",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Too many sign-up attempts"));
    assert!(!app.gateway.has_user("new@azmotos.kz"));
}

#[tokio::test]
async fn test_register_profile_failure_stays_on_form() {
    let gateway = FakeGateway::new();
    gateway.fail_inserts_into(tables::PROFILES);
    let app = TestApp::new(gateway);

    let response = app
        .post_form(
            "/auth/register",
            "email=new%40azmotos.kz&password=secret1&password_confirm=secret1&full_name=Aidar",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(location(response.headers()).is_none());

    let body = body_text(response).await;
    assert!(body.contains("we could not save your profile"));
    assert!(body.contains(r#"value="Aidar""#));

    assert!(app.gateway.has_user("new@azmotos.kz"));
    assert!(app.gateway.rows(tables::PROFILES).is_empty());
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = TestApp::with_member();
    let cookie = app.sign_in_member().await;

    let response = app.post_form("/auth/logout", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/auth/login"));
    assert_eq!(app.gateway.calls().sign_out, 1);

    let response = app.get("/catalog", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/auth/login"));
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let app = TestApp::with_member();
    app.gateway.set_token_lifetime(chrono::Duration::zero());
    let cookie = app.sign_in_member().await;

    let response = app.get("/catalog", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.gateway.calls().refresh, 1);
}

#[tokio::test]
async fn test_failed_refresh_signs_out() {
    let app = TestApp::with_member();
    app.gateway.set_token_lifetime(chrono::Duration::zero());
    let cookie = app.sign_in_member().await;
    app.gateway.fail_refresh(true);

    let response = app.get("/catalog", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/auth/login"));

    // The session was cleared, so no second refresh is attempted.
    let response = app.get("/catalog", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.gateway.calls().refresh, 1);
}
