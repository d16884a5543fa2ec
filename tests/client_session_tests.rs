// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client signup session driven against a live server on localhost.

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mimo_onboarding::client::session::{error_message, SignupSession, FALLBACK_WHATSAPP_URL};
use mimo_onboarding::client::storage::{LocalStore, AUTH_TOKEN_KEY, SIGNUP_STATE_KEY};
use mimo_onboarding::client::ApiClient;
use mimo_onboarding::flow::{FlowSnapshot, SignupStep};
use mimo_onboarding::models::PlanType;
use tempfile::TempDir;

mod common;
use common::{create_test_app, TestApp};

const PAGE: &str = "http://localhost:5173/signup";

/// Serve the test app on an ephemeral port; returns its base URL.
async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Backend that accepts any credential but answers `/api/auth/me` with `me_status`.
async fn serve_failing_profile(me_status: StatusCode) -> String {
    let router = Router::new()
        .route(
            "/api/auth/verify",
            get(|| async { Json(serde_json::json!({ "valid": true })) }),
        )
        .route(
            "/api/auth/me",
            get(move || async move {
                (me_status, Json(serde_json::json!({ "error": "unavailable" })))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn session(base_url: &str, dir: &TempDir) -> SignupSession {
    let api = ApiClient::new(base_url).unwrap();
    let store = LocalStore::open(dir.path()).await.unwrap();
    SignupSession::new(api, store)
}

#[tokio::test]
async fn test_full_signup_flow() {
    let app = create_test_app();
    let base_url = serve(&app).await;
    let dir = TempDir::new().unwrap();

    let mut signup = session(&base_url, &dir).await;
    let clean = signup.initialize(PAGE).await.unwrap();
    assert_eq!(clean, PAGE);
    assert_eq!(signup.step(), SignupStep::PhoneNumber);
    assert!(!signup.is_authenticated());

    let result = signup.submit_phone("050-123-4567").await.unwrap();
    assert!(result.should_connect_google);
    assert_eq!(signup.step(), SignupStep::GoogleAuth);
    let user_id = signup.flow().user_id.unwrap();

    let auth_url = signup.begin_google_auth(PlanType::Pro).await.unwrap();
    assert!(auth_url.contains("plan=pro"));

    // Stand in for the browser round trip through Google.
    let linked = app
        .state
        .identity
        .exchange_authorization_code("code", user_id)
        .await
        .unwrap();

    // Page reload after the callback redirect.
    let mut signup = session(&base_url, &dir).await;
    let clean = signup
        .initialize(&format!(
            "{PAGE}?token={}&step=whatsapp_redirect",
            linked.session_token
        ))
        .await
        .unwrap();
    assert_eq!(clean, PAGE);
    assert_eq!(signup.step(), SignupStep::WhatsappRedirect);
    assert_eq!(signup.user().unwrap().email.as_deref(), Some(common::TEST_EMAIL));

    let whatsapp = signup.complete_onboarding().await.unwrap();
    assert!(whatsapp.url.starts_with("https://wa.me/972501234567"));
    assert_eq!(signup.step(), SignupStep::Completed);

    // Restart resumes at the end from the stored credential alone.
    let mut resumed = session(&base_url, &dir).await;
    resumed.initialize(PAGE).await.unwrap();
    assert_eq!(resumed.step(), SignupStep::Completed);
    assert!(resumed.user().unwrap().onboarding_complete);

    resumed.sign_out().await.unwrap();
    assert!(!resumed.is_authenticated());
    assert_eq!(resumed.step(), SignupStep::PhoneNumber);

    let store = LocalStore::open(dir.path()).await.unwrap();
    assert!(store.get::<String>(AUTH_TOKEN_KEY).await.is_none());
    assert!(store.get::<FlowSnapshot>(SIGNUP_STATE_KEY).await.is_none());
}

#[tokio::test]
async fn test_callback_error_is_shown() {
    let app = create_test_app();
    let base_url = serve(&app).await;
    let dir = TempDir::new().unwrap();

    let mut signup = session(&base_url, &dir).await;
    let clean = signup
        .initialize(&format!("{PAGE}?error=invalid_state"))
        .await
        .unwrap();

    assert_eq!(clean, PAGE);
    assert_eq!(signup.error(), Some(error_message("invalid_state")));
    assert_eq!(signup.step(), SignupStep::PhoneNumber);
}

#[tokio::test]
async fn test_google_auth_requires_phone() {
    let app = create_test_app();
    let base_url = serve(&app).await;
    let dir = TempDir::new().unwrap();

    let mut signup = session(&base_url, &dir).await;
    signup.initialize(PAGE).await.unwrap();

    assert!(signup.begin_google_auth(PlanType::Standard).await.is_err());
    assert!(signup.error().is_some());
}

#[tokio::test]
async fn test_rejected_token_is_discarded() {
    let app = create_test_app();
    let base_url = serve(&app).await;
    let dir = TempDir::new().unwrap();

    let mut signup = session(&base_url, &dir).await;
    signup
        .initialize(&format!("{PAGE}?token=not.a.token"))
        .await
        .unwrap();

    assert!(!signup.is_authenticated());
    let store = LocalStore::open(dir.path()).await.unwrap();
    assert!(store.get::<String>(AUTH_TOKEN_KEY).await.is_none());
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dir = TempDir::new().unwrap();

    let mut signup = session(&format!("http://{addr}"), &dir).await;
    signup
        .initialize(&format!("{PAGE}?token=kept.until.verified"))
        .await
        .unwrap();

    assert!(!signup.is_authenticated());
    assert_eq!(signup.step(), SignupStep::PhoneNumber);
    assert_eq!(signup.whatsapp_url(None).await, FALLBACK_WHATSAPP_URL);

    // The credential survives an outage.
    let store = LocalStore::open(dir.path()).await.unwrap();
    assert_eq!(
        store.get::<String>(AUTH_TOKEN_KEY).await.as_deref(),
        Some("kept.until.verified")
    );
}

#[tokio::test]
async fn test_profile_outage_keeps_token() {
    let base_url = serve_failing_profile(StatusCode::SERVICE_UNAVAILABLE).await;
    let dir = TempDir::new().unwrap();

    let mut signup = session(&base_url, &dir).await;
    signup
        .initialize(&format!("{PAGE}?token=still.good"))
        .await
        .unwrap();

    assert!(!signup.is_authenticated());
    let store = LocalStore::open(dir.path()).await.unwrap();
    assert_eq!(
        store.get::<String>(AUTH_TOKEN_KEY).await.as_deref(),
        Some("still.good")
    );
}

#[tokio::test]
async fn test_profile_rejection_discards_token() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::NOT_FOUND] {
        let base_url = serve_failing_profile(status).await;
        let dir = TempDir::new().unwrap();

        let mut signup = session(&base_url, &dir).await;
        signup
            .initialize(&format!("{PAGE}?token=revoked.user"))
            .await
            .unwrap();

        assert!(!signup.is_authenticated());
        let store = LocalStore::open(dir.path()).await.unwrap();
        assert!(store.get::<String>(AUTH_TOKEN_KEY).await.is_none(), "{status}");
    }
}
