// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed HTTP client for the onboarding API.
//!
//! Every call has a 10 second bound; a server that cannot be reached is
//! reported as [`ClientError::ServerUnavailable`] so callers can treat it
//! as "not signed in" rather than failing hard.

pub mod session;
pub mod storage;

pub use session::{error_message, SignupSession};
pub use storage::LocalStore;

use crate::models::{PlanType, UserView};
use crate::services::onboarding::WhatsAppInfo;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("{}", message.as_deref().unwrap_or(error))]
    Api {
        status: u16,
        error: String,
        message: Option<String>,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("local storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// True when the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::ServerUnavailable(_) | ClientError::Timeout)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() || err.is_request() {
            ClientError::ServerUnavailable(err.to_string())
        } else {
            ClientError::Decode(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPhoneResult {
    pub user: UserView,
    pub has_google_connection: bool,
    pub jwt_token: String,
    pub should_connect_google: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The signed-in user as reported by `/api/auth/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub whatsapp_number: String,
    pub plan_type: PlanType,
    pub onboarding_complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedOnboarding {
    pub user: UserView,
    pub whatsapp: WhatsAppInfo,
}

#[derive(Deserialize)]
struct UserEnvelope<T> {
    user: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthUrlEnvelope {
    auth_url: String,
}

#[derive(Deserialize)]
struct TokensEnvelope {
    tokens: AccessToken,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhoneBody<'a> {
    phone_number: &'a str,
}

/// Onboarding API client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Client for the API served at `base_url` (e.g. `http://localhost:3001`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClientError::ServerUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => ClientError::Api {
                status: status.as_u16(),
                error: err.error,
                message: err.message,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                error: format!("http_{}", status.as_u16()),
                message: None,
            },
        })
    }

    // ─── Auth ────────────────────────────────────────────────────

    pub async fn verify(&self) -> Result<VerifyResult, ClientError> {
        self.send(self.request(Method::GET, "/api/auth/verify"))
            .await
    }

    pub async fn current_user(&self) -> Result<CurrentUser, ClientError> {
        let envelope: UserEnvelope<CurrentUser> =
            self.send(self.request(Method::GET, "/api/auth/me")).await?;
        Ok(envelope.user)
    }

    /// Consent URL for linking Google to `user_id`.
    pub async fn google_auth_url(
        &self,
        user_id: Uuid,
        plan: PlanType,
    ) -> Result<String, ClientError> {
        let user_id = user_id.to_string();
        let envelope: AuthUrlEnvelope = self
            .send(
                self.request(Method::GET, "/api/auth/google")
                    .query(&[("userId", user_id.as_str()), ("planType", plan.as_str())]),
            )
            .await?;
        Ok(envelope.auth_url)
    }

    pub async fn refresh(&self) -> Result<AccessToken, ClientError> {
        let envelope: TokensEnvelope = self
            .send(self.request(Method::POST, "/api/auth/refresh"))
            .await?;
        Ok(envelope.tokens)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .send(self.request(Method::POST, "/api/auth/logout"))
            .await?;
        Ok(())
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn check_phone(&self, phone_number: &str) -> Result<CheckPhoneResult, ClientError> {
        self.send(
            self.request(Method::POST, "/api/users/check-phone")
                .json(&PhoneBody { phone_number }),
        )
        .await
    }

    pub async fn update_phone(&self, phone_number: &str) -> Result<UserView, ClientError> {
        let envelope: UserEnvelope<UserView> = self
            .send(
                self.request(Method::PUT, "/api/users/me/phone")
                    .json(&PhoneBody { phone_number }),
            )
            .await?;
        Ok(envelope.user)
    }

    pub async fn me(&self) -> Result<UserView, ClientError> {
        let envelope: UserEnvelope<UserView> =
            self.send(self.request(Method::GET, "/api/users/me")).await?;
        Ok(envelope.user)
    }

    pub async fn complete_onboarding(&self) -> Result<CompletedOnboarding, ClientError> {
        self.send(self.request(Method::POST, "/api/users/me/complete-onboarding"))
            .await
    }

    pub async fn whatsapp_info(&self, message: Option<&str>) -> Result<WhatsAppInfo, ClientError> {
        let mut builder = self.request(Method::GET, "/api/users/whatsapp-info");
        if let Some(message) = message {
            builder = builder.query(&[("message", message)]);
        }
        self.send(builder).await
    }
}
