// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Default timezone for new users.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";

/// Subscription plan. Determines which Google scopes are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    #[default]
    Standard,
    Pro,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Standard => "standard",
            PlanType::Pro => "pro",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown plan type: {0}")]
pub struct UnknownPlanType(pub String);

impl FromStr for PlanType {
    type Err = UnknownPlanType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanType::Free),
            "standard" => Ok(PlanType::Standard),
            "pro" => Ok(PlanType::Pro),
            other => Err(UnknownPlanType(other.to_string())),
        }
    }
}

impl TryFrom<String> for PlanType {
    type Error = UnknownPlanType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User record, keyed by WhatsApp number until Google is linked.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    /// E.164 number, unique
    pub whatsapp_number: String,
    pub google_email: Option<String>,
    /// Display name from the Google profile
    pub google_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub plan_type: PlanType,
    pub timezone: String,
    /// Only ever moves from false to true
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh user with default plan and timezone.
    pub fn new(whatsapp_number: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            whatsapp_number: whatsapp_number.into(),
            google_email: None,
            google_name: None,
            plan_type: PlanType::default(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            onboarding_complete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub whatsapp_number: Option<String>,
    pub google_email: Option<String>,
    pub google_name: Option<String>,
    pub plan_type: Option<PlanType>,
    pub timezone: Option<String>,
    /// Setting this never clears an already-complete onboarding.
    pub complete_onboarding: bool,
}

impl UserUpdate {
    pub fn google_identity(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            google_email: Some(email.into()),
            google_name: name,
            ..Default::default()
        }
    }

    pub fn whatsapp_number(number: impl Into<String>) -> Self {
        Self {
            whatsapp_number: Some(number.into()),
            ..Default::default()
        }
    }

    pub fn complete_onboarding() -> Self {
        Self {
            complete_onboarding: true,
            ..Default::default()
        }
    }

    /// Apply to an in-memory record, touching `updated_at`.
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(number) = &self.whatsapp_number {
            user.whatsapp_number = number.clone();
        }
        if let Some(email) = &self.google_email {
            user.google_email = Some(email.clone());
        }
        if let Some(name) = &self.google_name {
            user.google_name = Some(name.clone());
        }
        if let Some(plan) = self.plan_type {
            user.plan_type = plan;
        }
        if let Some(timezone) = &self.timezone {
            user.timezone = timezone.clone();
        }
        user.onboarding_complete |= self.complete_onboarding;
        user.updated_at = now;
    }
}

/// User as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: Option<String>,
    pub whatsapp_number: String,
    pub plan_type: PlanType,
    pub timezone: String,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.google_email.clone(),
            whatsapp_number: user.whatsapp_number.clone(),
            plan_type: user.plan_type,
            timezone: user.timezone.clone(),
            onboarding_complete: user.onboarding_complete,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_parse_and_display() {
        for plan in [PlanType::Free, PlanType::Standard, PlanType::Pro] {
            assert_eq!(plan.as_str().parse::<PlanType>().unwrap(), plan);
        }
        assert!("enterprise".parse::<PlanType>().is_err());
        assert_eq!(PlanType::default(), PlanType::Standard);
        assert_eq!(serde_json::to_string(&PlanType::Pro).unwrap(), "\"pro\"");
    }

    #[test]
    fn test_update_leaves_unset_fields() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let mut user = User::new("+972501234567", created);
        user.google_email = Some("old@example.com".to_string());

        let now = Utc::now();
        UserUpdate::whatsapp_number("+972521112222").apply(&mut user, now);

        assert_eq!(user.whatsapp_number, "+972521112222");
        assert_eq!(user.google_email.as_deref(), Some("old@example.com"));
        assert_eq!(user.updated_at, now);
        assert_eq!(user.created_at, created);
    }

    #[test]
    fn test_onboarding_never_reverts() {
        let mut user = User::new("+972501234567", Utc::now());
        UserUpdate::complete_onboarding().apply(&mut user, Utc::now());
        assert!(user.onboarding_complete);

        UserUpdate::default().apply(&mut user, Utc::now());
        assert!(user.onboarding_complete);
    }

    #[test]
    fn test_view_uses_camel_case() {
        let user = User::new("+972501234567", Utc::now());
        let json = serde_json::to_value(UserView::from(&user)).unwrap();
        assert_eq!(json["whatsappNumber"], "+972501234567");
        assert_eq!(json["planType"], "standard");
        assert_eq!(json["onboardingComplete"], false);
        assert!(json["email"].is_null());
    }
}
