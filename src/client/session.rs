// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side signup driver.
//!
//! Wires the flow state machine to the API and the local store so a signup
//! can be resumed after a restart from the stored credential and cache.

use super::storage::{LocalStore, AUTH_TOKEN_KEY, SIGNUP_STATE_KEY};
use super::{ApiClient, CheckPhoneResult, ClientError, CurrentUser};
use crate::flow::{resolve, FlowEvent, FlowSnapshot, ServerSnapshot, SignupStep};
use crate::models::PlanType;
use crate::services::onboarding::WhatsAppInfo;
use chrono::Utc;
use reqwest::Url;

/// Used when the server cannot produce a WhatsApp link.
pub const FALLBACK_WHATSAPP_URL: &str = "https://wa.me/972501234567";

/// User-facing message for a callback error code.
pub fn error_message(code: &str) -> &'static str {
    match code {
        "auth_failed" => "ההתחברות נכשלה. אנא נסה שוב.",
        "invalid_state" => "שגיאת אבטחה. אנא נסה שוב.",
        "access_denied" => "הגישה נדחתה. אנא אשר את ההרשאות.",
        "session_expired" => "פג תוקף החיבור. אנא התחל מחדש.",
        _ => "משהו השתבש. אנא נסה שוב.",
    }
}

/// Callback parameters pulled off the signup page URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub step: Option<String>,
    pub error: Option<String>,
    /// The URL with those parameters removed
    pub clean_url: String,
}

/// Split callback parameters from `url`, keeping every other parameter.
pub fn take_callback_params(url: &str) -> Result<CallbackParams, ClientError> {
    let mut parsed =
        Url::parse(url).map_err(|e| ClientError::Decode(format!("bad page URL: {e}")))?;
    let mut params = CallbackParams::default();
    let mut kept = Vec::new();

    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "token" => params.token = Some(value.into_owned()),
            "step" => params.step = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => kept.push((key.into_owned(), value.into_owned())),
        }
    }

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&kept);
    }
    params.clean_url = parsed.into();
    Ok(params)
}

/// Client-side signup session.
pub struct SignupSession {
    api: ApiClient,
    store: LocalStore,
    flow: FlowSnapshot,
    user: Option<CurrentUser>,
    error: Option<String>,
}

impl SignupSession {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self {
            api,
            store,
            flow: FlowSnapshot::new(Utc::now()),
            user: None,
            error: None,
        }
    }

    pub fn flow(&self) -> &FlowSnapshot {
        &self.flow
    }

    pub fn step(&self) -> SignupStep {
        self.flow.step
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Message for the last failed action, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Restore the session on page load.
    ///
    /// Consumes `token`/`step`/`error` from `current_url` and returns the
    /// URL without them, so the credential never stays in the address bar.
    pub async fn initialize(&mut self, current_url: &str) -> Result<String, ClientError> {
        let params = take_callback_params(current_url)?;

        if let Some(code) = &params.error {
            tracing::warn!(code = %code, "Signup callback reported an error");
            self.error = Some(error_message(code).to_string());
        }

        if let Some(token) = &params.token {
            self.store.set(AUTH_TOKEN_KEY, token).await?;
        }
        let token = self.store.get::<String>(AUTH_TOKEN_KEY).await;
        self.api.set_token(token.clone());

        self.user = match token {
            Some(_) => self.load_user().await?,
            None => None,
        };

        let server = self.user.as_ref().map(|u| ServerSnapshot {
            user_id: u.id,
            whatsapp_number: Some(u.whatsapp_number.clone()),
            google_email: u.email.clone(),
            onboarding_complete: u.onboarding_complete,
        });
        let cached = self.store.get::<FlowSnapshot>(SIGNUP_STATE_KEY).await;
        let url_step = params.step.as_deref().and_then(|s| s.parse().ok());

        self.flow = resolve(server.as_ref(), cached.as_ref(), url_step, Utc::now());
        self.save_flow().await?;

        Ok(params.clean_url)
    }

    /// Verify the stored credential and fetch the user it belongs to.
    ///
    /// An unreachable or failing server leaves the caller signed out for now
    /// but keeps the credential; a rejected credential is discarded.
    async fn load_user(&mut self) -> Result<Option<CurrentUser>, ClientError> {
        match self.api.verify().await {
            Ok(result) if result.valid => {}
            Ok(_) => {
                self.clear_token().await?;
                return Ok(None);
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!(error = %e, "Backend unavailable, continuing signed out");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        match self.api.current_user().await {
            Ok(user) => Ok(Some(user)),
            Err(e @ ClientError::Api { status: 401 | 404, .. }) => {
                tracing::warn!(error = %e, "Server rejected stored credential");
                self.clear_token().await?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load user profile, keeping credential");
                Ok(None)
            }
        }
    }

    /// Submit the phone step.
    pub async fn submit_phone(&mut self, phone_number: &str) -> Result<CheckPhoneResult, ClientError> {
        self.error = None;

        let result = match self.api.check_phone(phone_number).await {
            Ok(result) => result,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.store.set(AUTH_TOKEN_KEY, &result.jwt_token).await?;
        self.api.set_token(Some(result.jwt_token.clone()));

        let base = if self.flow.step == SignupStep::Completed {
            FlowSnapshot::new(Utc::now())
        } else {
            self.flow.clone()
        };
        let mut next = base
            .apply(
                FlowEvent::PhoneChecked {
                    user_id: result.user.id,
                    whatsapp_number: result.user.whatsapp_number.clone(),
                    has_google_connection: result.has_google_connection,
                },
                Utc::now(),
            )
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        next.google_email = result.user.email.clone();
        self.flow = next;
        self.save_flow().await?;

        self.user = Some(CurrentUser {
            id: result.user.id,
            email: result.user.email.clone(),
            name: None,
            whatsapp_number: result.user.whatsapp_number.clone(),
            plan_type: result.user.plan_type,
            onboarding_complete: result.user.onboarding_complete,
        });

        Ok(result)
    }

    /// Consent URL to send the browser to. Requires the phone step first.
    pub async fn begin_google_auth(&mut self, plan: PlanType) -> Result<String, ClientError> {
        let Some(user_id) = self.flow.user_id else {
            let message = "אנא הזן מספר טלפון תחילה";
            self.error = Some(message.to_string());
            return Err(ClientError::Api {
                status: 400,
                error: "phone_required".to_string(),
                message: Some(message.to_string()),
            });
        };

        self.error = None;
        self.api.google_auth_url(user_id, plan).await.inspect_err(|e| {
            self.error = Some(e.to_string());
        })
    }

    /// Mark onboarding complete and return the WhatsApp link.
    pub async fn complete_onboarding(&mut self) -> Result<WhatsAppInfo, ClientError> {
        self.error = None;

        let completed = match self.api.complete_onboarding().await {
            Ok(completed) => completed,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        let mut next = self.flow.clone();
        next.step = SignupStep::Completed;
        next.updated_at = Utc::now();
        self.flow = next;
        self.save_flow().await?;

        if let Some(user) = &mut self.user {
            user.onboarding_complete = completed.user.onboarding_complete;
        }

        Ok(completed.whatsapp)
    }

    /// WhatsApp deep link; falls back to a fixed link when the server fails.
    pub async fn whatsapp_url(&self, message: Option<&str>) -> String {
        match self.api.whatsapp_info(message).await {
            Ok(info) => info.url,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get WhatsApp link, using fallback");
                FALLBACK_WHATSAPP_URL.to_string()
            }
        }
    }

    /// Sign out. Local state is cleared even if the server call fails.
    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        if let Err(e) = self.api.logout().await {
            tracing::warn!(error = %e, "Logout request failed");
        }

        self.clear_token().await?;
        self.user = None;
        self.reset().await
    }

    /// Restart the signup flow from the phone step.
    pub async fn reset(&mut self) -> Result<(), ClientError> {
        self.store.remove(SIGNUP_STATE_KEY).await?;
        self.flow = self
            .flow
            .apply(FlowEvent::Reset, Utc::now())
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        self.error = None;
        Ok(())
    }

    async fn clear_token(&mut self) -> Result<(), ClientError> {
        self.api.set_token(None);
        self.store.remove(AUTH_TOKEN_KEY).await
    }

    async fn save_flow(&self) -> Result<(), ClientError> {
        self.store.set(SIGNUP_STATE_KEY, &self.flow).await
    }
}
