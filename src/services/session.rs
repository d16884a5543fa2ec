// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session credentials (HS256 JWTs) carried as `Bearer` tokens.

use crate::models::{PlanType, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validity window of a session credential (7 days).
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    /// Google email, if linked when the token was issued
    pub email: Option<String>,
    pub plan_type: PlanType,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

/// Create a session credential for a user.
pub fn create_session_token(user: &User, signing_key: &[u8]) -> anyhow::Result<String> {
    create_session_token_at(user, signing_key, Utc::now())
}

/// Create a session credential as if issued at `issued_at`.
pub fn create_session_token_at(
    user: &User,
    signing_key: &[u8],
    issued_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let iat = issued_at.timestamp();
    let exp = (issued_at + Duration::seconds(SESSION_TTL_SECS)).timestamp();
    anyhow::ensure!(iat >= 0, "issue time before the Unix epoch");

    let claims = Claims {
        user_id: user.id,
        email: user.google_email.clone(),
        plan_type: user.plan_type,
        iat: iat as usize,
        exp: exp as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a session credential.
///
/// Expired, tampered, and malformed tokens all yield `None`.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Option<Claims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session token");
            None
        }
    }
}
