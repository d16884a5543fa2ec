// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup flow state machine.
//!
//! The flow moves `phone_number → google_auth → whatsapp_redirect → completed`.
//! A client keeps a [`FlowSnapshot`] in its local cache; on start-up
//! [`resolve`] merges it with the server's view of the user and any step
//! carried on the callback URL. The server's view always wins, and a cached
//! snapshot older than [`FLOW_TTL_HOURS`] is ignored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// How long a cached snapshot stays usable after the flow started.
pub const FLOW_TTL_HOURS: i64 = 24;

/// A step of the signup flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SignupStep {
    #[default]
    PhoneNumber,
    GoogleAuth,
    WhatsappRedirect,
    Completed,
}

impl SignupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupStep::PhoneNumber => "phone_number",
            SignupStep::GoogleAuth => "google_auth",
            SignupStep::WhatsappRedirect => "whatsapp_redirect",
            SignupStep::Completed => "completed",
        }
    }
}

impl fmt::Display for SignupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignupStep {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone_number" => Ok(SignupStep::PhoneNumber),
            "google_auth" => Ok(SignupStep::GoogleAuth),
            "whatsapp_redirect" => Ok(SignupStep::WhatsappRedirect),
            "completed" => Ok(SignupStep::Completed),
            other => Err(FlowError::UnknownStep(other.to_string())),
        }
    }
}

/// Client-held flow state, as persisted in the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub step: SignupStep,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub has_google_connection: bool,
    #[serde(default)]
    pub google_email: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl FlowSnapshot {
    /// A flow starting at the phone step.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            step: SignupStep::PhoneNumber,
            user_id: None,
            whatsapp_number: None,
            has_google_connection: false,
            google_email: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// True until [`FLOW_TTL_HOURS`] after the flow started.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at < Duration::hours(FLOW_TTL_HOURS)
    }

    /// Apply an event, returning the next snapshot.
    pub fn apply(&self, event: FlowEvent, now: DateTime<Utc>) -> Result<Self, FlowError> {
        let mut next = self.clone();

        match event {
            FlowEvent::PhoneChecked {
                user_id,
                whatsapp_number,
                has_google_connection,
            } => {
                if self.step == SignupStep::Completed {
                    return Err(FlowError::InvalidTransition {
                        from: self.step,
                        event: "phone_checked",
                    });
                }
                next.user_id = Some(user_id);
                next.whatsapp_number = Some(whatsapp_number);
                next.has_google_connection = has_google_connection;
                next.step = if has_google_connection {
                    SignupStep::WhatsappRedirect
                } else {
                    SignupStep::GoogleAuth
                };
            }
            FlowEvent::GoogleLinked {
                email,
                onboarding_complete,
            } => {
                if self.step != SignupStep::GoogleAuth {
                    return Err(FlowError::InvalidTransition {
                        from: self.step,
                        event: "google_linked",
                    });
                }
                next.has_google_connection = true;
                next.google_email = email.or(next.google_email);
                next.step = if onboarding_complete {
                    SignupStep::Completed
                } else {
                    SignupStep::WhatsappRedirect
                };
            }
            FlowEvent::OnboardingCompleted => match self.step {
                SignupStep::WhatsappRedirect | SignupStep::Completed => {
                    next.step = SignupStep::Completed;
                }
                from => {
                    return Err(FlowError::InvalidTransition {
                        from,
                        event: "onboarding_completed",
                    })
                }
            },
            FlowEvent::Reset => return Ok(Self::new(now)),
        }

        next.updated_at = now;
        Ok(next)
    }
}

/// The server's record of the signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    pub user_id: Uuid,
    pub whatsapp_number: Option<String>,
    pub google_email: Option<String>,
    pub onboarding_complete: bool,
}

impl ServerSnapshot {
    /// The step implied by the user record alone.
    pub fn step(&self) -> SignupStep {
        if self.onboarding_complete {
            SignupStep::Completed
        } else if self.whatsapp_number.is_some() && self.google_email.is_some() {
            SignupStep::WhatsappRedirect
        } else if self.whatsapp_number.is_some() {
            SignupStep::GoogleAuth
        } else {
            SignupStep::PhoneNumber
        }
    }
}

/// Flow events driven by server responses.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// `check-phone` answered
    PhoneChecked {
        user_id: Uuid,
        whatsapp_number: String,
        has_google_connection: bool,
    },
    /// OAuth callback returned a session token
    GoogleLinked {
        email: Option<String>,
        onboarding_complete: bool,
    },
    OnboardingCompleted,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("cannot apply {event} at step {from}")]
    InvalidTransition {
        from: SignupStep,
        event: &'static str,
    },
    #[error("unknown signup step: {0}")]
    UnknownStep(String),
}

/// Reconcile the server record, the local cache and a URL step override.
///
/// Precedence: server record, then URL step, then a fresh cache. With a
/// server record present, the URL step is ignored and cached fields only
/// survive when they belong to the same user.
pub fn resolve(
    server: Option<&ServerSnapshot>,
    cached: Option<&FlowSnapshot>,
    url_step: Option<SignupStep>,
    now: DateTime<Utc>,
) -> FlowSnapshot {
    let cached = cached.filter(|c| c.is_fresh(now));

    if let Some(server) = server {
        let mut snapshot = cached
            .filter(|c| c.user_id == Some(server.user_id))
            .cloned()
            .unwrap_or_else(|| FlowSnapshot::new(now));

        snapshot.user_id = Some(server.user_id);
        if server.whatsapp_number.is_some() {
            snapshot.whatsapp_number = server.whatsapp_number.clone();
        }
        snapshot.google_email = server.google_email.clone();
        snapshot.has_google_connection = server.google_email.is_some();
        snapshot.step = server.step();
        snapshot.updated_at = now;
        return snapshot;
    }

    let mut snapshot = cached.cloned().unwrap_or_else(|| FlowSnapshot::new(now));
    if let Some(step) = url_step {
        snapshot.step = step;
        snapshot.updated_at = now;
    }
    snapshot
}
