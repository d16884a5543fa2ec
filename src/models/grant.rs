// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored Google OAuth grant (one per user).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider column value for every grant.
pub const GOOGLE_PROVIDER: &str = "google";

/// User's Google OAuth tokens.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GoogleTokenGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    /// Absent on grants obtained without offline access
    pub refresh_token: Option<String>,
    /// `None` when the provider did not report a lifetime
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted OAuth scopes
    pub scope: Vec<String>,
    pub token_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoogleTokenGrant {
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Token set written on OAuth callback.
#[derive(Debug, Clone)]
pub struct GrantUpsert {
    pub access_token: String,
    /// `None` keeps whatever refresh token is already stored.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Vec<String>,
    pub token_type: Option<String>,
}

impl GrantUpsert {
    /// Merge into the existing grant (if any), preserving a stored refresh token.
    pub fn merge(
        self,
        existing: Option<&GoogleTokenGrant>,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> GoogleTokenGrant {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| existing.and_then(|g| g.refresh_token.clone()));

        GoogleTokenGrant {
            id: existing.map(|g| g.id).unwrap_or_else(Uuid::new_v4),
            user_id,
            provider: GOOGLE_PROVIDER.to_string(),
            access_token: self.access_token,
            refresh_token,
            expires_at: self.expires_at,
            scope: self.scope,
            token_type: Some(self.token_type.unwrap_or_else(|| "Bearer".to_string())),
            created_at: existing.map(|g| g.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

/// Partial grant update after a token refresh.
#[derive(Debug, Clone, Default)]
pub struct GrantUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantUpdate {
    pub fn apply(&self, grant: &mut GoogleTokenGrant, now: DateTime<Utc>) {
        if let Some(token) = &self.access_token {
            grant.access_token = token.clone();
        }
        if let Some(token) = self.refresh_token.as_ref().filter(|t| !t.is_empty()) {
            grant.refresh_token = Some(token.clone());
        }
        if let Some(expires_at) = self.expires_at {
            grant.expires_at = Some(expires_at);
        }
        grant.updated_at = now;
    }
}
