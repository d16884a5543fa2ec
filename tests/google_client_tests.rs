// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `GoogleClient` against a local stand-in for Google's token and
//! userinfo endpoints.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use mimo_onboarding::config::GoogleOAuthConfig;
use mimo_onboarding::error::AppError;
use mimo_onboarding::services::{GoogleClient, OAuthProvider};
use serde_json::json;
use std::collections::HashMap;

const CLIENT_ID: &str = "client-123";
const ACCESS_TOKEN: &str = "ya29.fake";

fn invalid_grant() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": "Token has been expired or revoked." })),
    )
        .into_response()
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("client_id").map(String::as_str) != Some(CLIENT_ID) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => match form.get("code").map(String::as_str) {
            Some("revoked") => invalid_grant(),
            Some("boom") => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
            _ => Json(json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": 3599,
                "refresh_token": "1//refresh",
                "scope": "openid email https://www.googleapis.com/auth/calendar",
                "token_type": "Bearer"
            }))
            .into_response(),
        },
        Some("refresh_token") => match form.get("refresh_token").map(String::as_str) {
            Some("revoked") => invalid_grant(),
            _ => Json(json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer"
            }))
            .into_response(),
        },
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response(),
    }
}

async fn userinfo(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {}", ACCESS_TOKEN);
    if headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({
        "id": "1234",
        "email": "user@example.com",
        "name": "Test User",
        "picture": "https://example.com/p.png"
    }))
    .into_response()
}

/// Start the fake Google and return a client pointed at it.
async fn client() -> GoogleClient {
    let app = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    GoogleClient::new(&GoogleOAuthConfig {
        client_id: CLIENT_ID.to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://localhost:3001/api/auth/google/callback".to_string(),
    })
    .unwrap()
    .with_endpoints(
        &format!("http://{addr}/token"),
        &format!("http://{addr}/userinfo"),
    )
}

#[tokio::test]
async fn test_exchange_code_and_fetch_profile() {
    let google = client().await;

    let tokens = google.exchange_code("auth-code").await.unwrap();
    assert_eq!(tokens.access_token, ACCESS_TOKEN);
    assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
    assert!(tokens.expires_at.is_some());
    assert_eq!(
        tokens.scope.unwrap(),
        vec![
            "openid".to_string(),
            "email".to_string(),
            "https://www.googleapis.com/auth/calendar".to_string()
        ]
    );

    let profile = google.fetch_profile(&tokens.access_token).await.unwrap();
    assert_eq!(profile.email, "user@example.com");
    assert_eq!(profile.name.as_deref(), Some("Test User"));
}

#[tokio::test]
async fn test_refresh_without_new_refresh_token() {
    let google = client().await;

    let tokens = google.refresh_access_token("1//refresh").await.unwrap();
    assert_eq!(tokens.access_token, "ya29.refreshed");
    assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
async fn test_invalid_grant_is_consent_expired() {
    let google = client().await;

    let err = google.refresh_access_token("revoked").await.unwrap_err();
    assert!(matches!(err, AppError::ConsentExpired));

    let err = google.exchange_code("revoked").await.unwrap_err();
    assert!(matches!(err, AppError::ConsentExpired));
}

#[tokio::test]
async fn test_upstream_failure_is_provider_error() {
    let google = client().await;

    let err = google.exchange_code("boom").await.unwrap_err();
    assert!(matches!(err, AppError::Provider(_)));

    let err = google.fetch_profile("wrong-token").await.unwrap_err();
    assert!(matches!(err, AppError::Provider(_)));
}

#[tokio::test]
async fn test_unreachable_google_is_provider_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let google = client().await.with_endpoints(
        &format!("http://{addr}/token"),
        &format!("http://{addr}/userinfo"),
    );

    let err = google.exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, AppError::Provider(_)));
}
