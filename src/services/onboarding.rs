// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone capture, onboarding completion and the WhatsApp handoff link.

use crate::db::DynStore;
use crate::error::AppError;
use crate::models::{User, UserUpdate};
use crate::services::phone::parse_phone;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Message pre-filled in the WhatsApp chat after signup.
pub const WELCOME_MESSAGE: &str = "היי מימו! סיימתי את ההרשמה ואני מוכן להתחיל 🎉";

/// WhatsApp deep link details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WhatsAppInfo {
    pub number: String,
    pub message: String,
    pub url: String,
}

/// Result of submitting a phone number.
#[derive(Debug, Clone)]
pub struct PhoneCheck {
    pub user: User,
    /// True when a grant with a refresh token is stored
    pub has_google_connection: bool,
}

/// User-facing onboarding operations.
#[derive(Clone)]
pub struct OnboardingService {
    store: DynStore,
    whatsapp_number: String,
}

impl OnboardingService {
    pub fn new(store: DynStore, whatsapp_number: impl Into<String>) -> Self {
        Self {
            store,
            whatsapp_number: whatsapp_number.into(),
        }
    }

    /// Normalize the number, find or create its user, report Google status.
    pub async fn check_phone(&self, raw_number: &str) -> Result<PhoneCheck, AppError> {
        let number = parse_phone(raw_number)?;
        let user = self.store.find_or_create_user_by_phone(&number).await?;

        let has_google_connection = self
            .store
            .find_grant(user.id)
            .await?
            .is_some_and(|g| g.has_refresh_token());

        tracing::info!(
            user_id = %user.id,
            has_google_connection,
            "Phone number checked"
        );

        Ok(PhoneCheck {
            user,
            has_google_connection,
        })
    }

    /// Change an existing user's number, or create a user for an anonymous caller.
    pub async fn set_phone(&self, user_id: Option<Uuid>, raw_number: &str) -> Result<User, AppError> {
        let number = parse_phone(raw_number)?;

        match user_id {
            Some(id) => self
                .store
                .update_user(id, &UserUpdate::whatsapp_number(number))
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {id}"))),
            None => self.store.find_or_create_user_by_phone(&number).await,
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))
    }

    /// Mark onboarding complete. Idempotent.
    pub async fn complete_onboarding(&self, user_id: Uuid) -> Result<User, AppError> {
        let user = self
            .store
            .update_user(user_id, &UserUpdate::complete_onboarding())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        tracing::info!(user_id = %user.id, "Onboarding complete");
        Ok(user)
    }

    /// WhatsApp link that opens a chat with the message pre-filled.
    pub fn whatsapp_info(&self, message: Option<&str>) -> WhatsAppInfo {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(WELCOME_MESSAGE);

        WhatsAppInfo {
            number: self.whatsapp_number.clone(),
            message: message.to_string(),
            url: format!(
                "https://wa.me/{}?text={}",
                self.whatsapp_number,
                urlencoding::encode(message)
            ),
        }
    }
}
