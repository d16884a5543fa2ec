// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
};
use chrono::{Duration, Utc};
use mimo_onboarding::config::Config;
use mimo_onboarding::db::MemoryStore;
use mimo_onboarding::error::AppError;
use mimo_onboarding::models::PlanType;
use mimo_onboarding::routes::create_router;
use mimo_onboarding::services::{OAuthProvider, ProviderProfile, ProviderTokens};
use mimo_onboarding::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Database URL for Postgres integration tests, if one is configured.
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Skip test with message if no database is available.
#[macro_export]
macro_rules! require_database {
    () => {
        match crate::common::database_url() {
            Some(url) => url,
            None => {
                eprintln!("⚠️  Skipping: DATABASE_URL not set");
                return;
            }
        }
    };
}

pub const TEST_EMAIL: &str = "user@example.com";

/// Offline stand-in for Google.
#[derive(Default)]
pub struct FakeProvider {
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    /// Omit the refresh token on code exchange (repeat consent)
    pub withhold_refresh_token: AtomicBool,
    /// Answer refreshes with `invalid_grant`
    pub revoked: AtomicBool,
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn authorization_url(&self, plan: PlanType, state: &str) -> String {
        format!(
            "https://accounts.example.test/auth?plan={}&state={}",
            plan,
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        if code == "bad-code" {
            return Err(AppError::Provider("invalid code".to_string()));
        }

        Ok(ProviderTokens {
            access_token: format!("access-{n}"),
            refresh_token: (!self.withhold_refresh_token.load(Ordering::SeqCst))
                .then(|| format!("refresh-{n}")),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scope: Some(vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ]),
            token_type: Some("Bearer".to_string()),
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ProviderProfile, AppError> {
        Ok(ProviderProfile {
            email: TEST_EMAIL.to_string(),
            name: Some("Test User".to_string()),
        })
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<ProviderTokens, AppError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(AppError::ConsentExpired);
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(ProviderTokens {
            access_token: format!("refreshed-{n}"),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scope: None,
            token_type: Some("Bearer".to_string()),
        })
    }
}

/// Router plus handles on its offline dependencies.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
}

/// Create a test app with offline mock dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(FakeProvider::default());
    let oauth: Arc<dyn OAuthProvider> = provider.clone();
    let state = Arc::new(AppState::new(config, store.clone(), Some(oauth)));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        provider,
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of a cookie set on the response (empty string for a removal).
#[allow(dead_code)]
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let (pair, _) = v.split_once(';').unwrap_or((v, ""));
            let (n, value) = pair.split_once('=')?;
            (n.trim() == name).then(|| value.trim().to_string())
        })
}

/// Query parameters of a redirect's `Location`.
#[allow(dead_code)]
pub fn redirect_params(response: &Response<Body>) -> HashMap<String, String> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap();
    reqwest::Url::parse(location)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

/// Submit a phone number; returns the user id and session token.
#[allow(dead_code)]
pub async fn signup(app: &TestApp, phone: &str) -> (Uuid, String) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/check-phone")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "phoneNumber": phone }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_success());

    let json = body_json(response).await;
    let user_id = json["user"]["id"].as_str().unwrap().parse().unwrap();
    let token = json["jwtToken"].as_str().unwrap().to_string();
    (user_id, token)
}

/// Start the OAuth flow; returns the `state` parameter and the nonce cookie.
#[allow(dead_code)]
pub async fn start_oauth(app: &TestApp, user_id: Uuid) -> (String, String) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/auth/google?userId={user_id}&planType=standard"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_success());

    let nonce = set_cookie(&response, "mimo_oauth_nonce").expect("nonce cookie");
    let json = body_json(response).await;
    let auth_url = reqwest::Url::parse(json["authUrl"].as_str().unwrap()).unwrap();
    let state = auth_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter");

    (state, nonce)
}

/// Hit the OAuth callback with an optional nonce cookie.
#[allow(dead_code)]
pub async fn callback(
    app: &TestApp,
    code: &str,
    state: &str,
    nonce: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder().uri(format!(
        "/api/auth/google/callback?code={}&state={}",
        urlencoding::encode(code),
        urlencoding::encode(state)
    ));
    if let Some(nonce) = nonce {
        request = request.header(header::COOKIE, format!("mimo_oauth_nonce={nonce}"));
    }

    app.router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}
