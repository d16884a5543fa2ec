// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client.
//!
//! Handles:
//! - Authorization URL construction (offline access, forced consent)
//! - Authorization code exchange
//! - Profile lookup
//! - Access token refresh

use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::models::PlanType;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// OAuth scope identifiers.
pub mod scopes {
    pub const OPENID: &str = "openid";
    pub const EMAIL: &str = "email";
    pub const PROFILE: &str = "profile";
    pub const CALENDAR: &str = "https://www.googleapis.com/auth/calendar";
    pub const GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
    pub const GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";

    pub const BASE: &[&str] = &[OPENID, EMAIL, PROFILE];
}

/// Scopes requested for a plan. Each plan's set contains the previous one's.
pub fn scopes_for_plan(plan: PlanType) -> Vec<&'static str> {
    let mut requested = scopes::BASE.to_vec();
    match plan {
        PlanType::Free => {}
        PlanType::Standard => requested.push(scopes::CALENDAR),
        PlanType::Pro => requested.extend([
            scopes::CALENDAR,
            scopes::GMAIL_MODIFY,
            scopes::GMAIL_SEND,
        ]),
    }
    requested
}

/// Tokens returned by the provider on code exchange or refresh.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes, if the provider reported them
    pub scope: Option<Vec<String>>,
    pub token_type: Option<String>,
}

/// Google account profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The external OAuth identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent URL for the given plan, carrying `state` back to the callback.
    fn authorization_url(&self, plan: PlanType, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError>;

    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<ProviderTokens, AppError>;
}

/// Google token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, now: DateTime<Utc>) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scope: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect()),
            token_type: self.token_type,
        }
    }
}

/// Google token endpoint error body.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google OAuth API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleClient {
    /// Create a new Google client with OAuth credentials.
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        })
    }

    /// Point token and profile calls at another host (local fakes).
    pub fn with_endpoints(mut self, token_url: &str, userinfo_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self.userinfo_url = userinfo_url.to_string();
        self
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token request failed: {}", e)))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
            // Revoked or expired consent; the user has to go through Google again.
            if err.error == "invalid_grant" {
                tracing::warn!(
                    description = err.error_description.as_deref().unwrap_or(""),
                    "Google rejected grant"
                );
                return Err(AppError::ConsentExpired);
            }
        }

        Err(AppError::Provider(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl OAuthProvider for GoogleClient {
    fn authorization_url(&self, plan: PlanType, state: &str) -> String {
        let scope = scopes_for_plan(plan).join(" ");
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             include_granted_scopes=true&\
             state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError> {
        let response = self
            .post_token_form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        Ok(response.into_tokens(Utc::now()))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Profile request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<ProviderTokens, AppError> {
        let response = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(response.into_tokens(Utc::now()))
    }
}
