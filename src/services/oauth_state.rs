// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed, stateless OAuth `state` tokens.
//!
//! The token carries the user id, plan, a random nonce and an expiry,
//! signed with HMAC-SHA256. The same nonce is set as an HttpOnly cookie
//! when the flow starts; the callback accepts the state only if the
//! signature verifies, it has not expired, and the nonce matches the cookie.

use crate::error::AppError;
use crate::models::PlanType;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an authorization attempt (10 minutes).
pub const STATE_TTL_SECS: i64 = 10 * 60;

const NONCE_BYTES: usize = 32;

/// Decoded contents of an OAuth state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub user_id: Uuid,
    pub plan_type: PlanType,
    /// Hex-encoded random nonce, mirrored in the nonce cookie
    pub nonce: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

/// Why a state token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state parameter missing")]
    Missing,
    #[error("state parameter malformed")]
    Malformed,
    #[error("state signature mismatch")]
    BadSignature,
    #[error("state nonce does not match this browser session")]
    NonceMismatch,
    #[error("authorization attempt expired")]
    Expired,
}

impl StateError {
    /// Error code carried on the redirect back to the frontend.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            StateError::Expired => "session_expired",
            _ => "invalid_state",
        }
    }
}

/// Mint a random hex nonce.
pub fn generate_nonce() -> Result<String, AppError> {
    let mut bytes = [0u8; NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(hex::encode(bytes))
}

impl OAuthState {
    /// New state for an authorization attempt starting at `now`.
    pub fn new(user_id: Uuid, plan_type: PlanType, now: DateTime<Utc>) -> Result<Self, AppError> {
        Ok(Self {
            user_id,
            plan_type,
            nonce: generate_nonce()?,
            expires_at: now.timestamp() + STATE_TTL_SECS,
        })
    }

    fn payload(&self) -> String {
        format!(
            "{}|{}|{}|{:x}",
            self.user_id, self.plan_type, self.nonce, self.expires_at
        )
    }

    /// Encode as `base64url(payload|hmac_hex)`.
    pub fn sign(&self, secret: &[u8]) -> Result<String, AppError> {
        let payload = self.payload();
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
    }

    /// Verify signature and expiry, then decode.
    pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Self, StateError> {
        if token.is_empty() {
            return Err(StateError::Missing);
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StateError::Malformed)?;
        let decoded = String::from_utf8(bytes).map_err(|_| StateError::Malformed)?;

        // Format is "user_id|plan|nonce|expiry_hex|signature_hex"
        let (payload, signature_hex) = decoded.rsplit_once('|').ok_or(StateError::Malformed)?;
        let signature = hex::decode(signature_hex).map_err(|_| StateError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| StateError::Malformed)?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            tracing::error!("OAuth state signature mismatch! Potential tampering.");
            return Err(StateError::BadSignature);
        }

        let parts: Vec<&str> = payload.split('|').collect();
        let [user_id, plan_type, nonce, expires_hex] = parts.as_slice() else {
            return Err(StateError::Malformed);
        };

        let state = OAuthState {
            user_id: user_id.parse().map_err(|_| StateError::Malformed)?,
            plan_type: plan_type.parse().map_err(|_| StateError::Malformed)?,
            nonce: nonce.to_string(),
            expires_at: i64::from_str_radix(expires_hex, 16).map_err(|_| StateError::Malformed)?,
        };

        if now.timestamp() > state.expires_at {
            return Err(StateError::Expired);
        }

        Ok(state)
    }

    /// Compare the embedded nonce with the one from the browser cookie.
    pub fn check_nonce(&self, cookie_nonce: Option<&str>) -> Result<(), StateError> {
        let cookie_nonce = cookie_nonce.ok_or(StateError::NonceMismatch)?;
        if bool::from(self.nonce.as_bytes().ct_eq(cookie_nonce.as_bytes())) {
            Ok(())
        } else {
            Err(StateError::NonceMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"secret_key";

    fn fresh_state() -> OAuthState {
        OAuthState::new(Uuid::new_v4(), PlanType::Pro, Utc::now()).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let state = fresh_state();
        let token = state.sign(SECRET).unwrap();

        let decoded = OAuthState::verify(&token, SECRET, Utc::now()).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.nonce.len(), NONCE_BYTES * 2);
    }

    #[test]
    fn test_wrong_secret() {
        let token = fresh_state().sign(SECRET).unwrap();
        assert_eq!(
            OAuthState::verify(&token, b"wrong_key", Utc::now()),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let state = fresh_state();
        let token = state.sign(SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        let tampered = decoded.replacen("pro", "free", 1);
        let tampered = URL_SAFE_NO_PAD.encode(tampered);

        assert_eq!(
            OAuthState::verify(&tampered, SECRET, Utc::now()),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn test_expired() {
        let state = OAuthState::new(Uuid::new_v4(), PlanType::Standard, Utc::now()).unwrap();
        let token = state.sign(SECRET).unwrap();
        let later = Utc::now() + Duration::seconds(STATE_TTL_SECS + 5);

        let err = OAuthState::verify(&token, SECRET, later).unwrap_err();
        assert_eq!(err, StateError::Expired);
        assert_eq!(err.redirect_code(), "session_expired");
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            OAuthState::verify("", SECRET, Utc::now()),
            Err(StateError::Missing)
        );
        assert_eq!(
            OAuthState::verify("not-valid-base64!!!", SECRET, Utc::now()),
            Err(StateError::Malformed)
        );
        let no_sig = URL_SAFE_NO_PAD.encode("invalid");
        assert_eq!(
            OAuthState::verify(&no_sig, SECRET, Utc::now()),
            Err(StateError::Malformed)
        );
    }

    #[test]
    fn test_nonce_check() {
        let state = fresh_state();
        assert!(state.check_nonce(Some(&state.nonce)).is_ok());
        assert_eq!(state.check_nonce(None), Err(StateError::NonceMismatch));
        assert_eq!(
            state.check_nonce(Some("deadbeef")),
            Err(StateError::NonceMismatch)
        );
        assert_eq!(StateError::NonceMismatch.redirect_code(), "invalid_state");
    }

    #[test]
    fn test_state_is_url_safe() {
        let token = fresh_state().sign(SECRET).unwrap();
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }
}
