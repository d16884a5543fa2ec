// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity and token service: links Google accounts to phone-keyed users,
//! stores their grants and issues session credentials.

use crate::db::DynStore;
use crate::error::AppError;
use crate::models::{GoogleTokenGrant, GrantUpdate, GrantUpsert, PlanType, User, UserUpdate};
use crate::services::google::{scopes_for_plan, OAuthProvider, ProviderProfile};
use crate::services::oauth_state::{OAuthState, StateError};
use crate::services::session::{create_session_token, verify_session_token, Claims};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-user locks, shared across clones of the service.
pub type UserLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Held while one user's grant is being written. The map entry is dropped
/// with the last holder, so the map only holds users with work in flight.
struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: UserLocks,
    user_id: Uuid,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own reference left: nobody holds or awaits it.
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A started authorization attempt.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub auth_url: String,
    /// Nonce to set as the browser cookie
    pub nonce: String,
}

/// Outcome of a successful OAuth callback.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub user: User,
    pub grant: GoogleTokenGrant,
    pub profile: ProviderProfile,
    pub session_token: String,
}

/// Fresh provider access token.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Identity service.
///
/// Concurrent refreshes and callbacks for one user are serialized within
/// this process; across instances the store's upsert keeps rows consistent.
#[derive(Clone)]
pub struct IdentityService {
    store: DynStore,
    provider: Option<Arc<dyn OAuthProvider>>,
    state_secret: Vec<u8>,
    jwt_signing_key: Vec<u8>,
    user_locks: UserLocks,
}

impl IdentityService {
    pub fn new(
        store: DynStore,
        provider: Option<Arc<dyn OAuthProvider>>,
        state_secret: Vec<u8>,
        jwt_signing_key: Vec<u8>,
    ) -> Self {
        Self {
            store,
            provider,
            state_secret,
            jwt_signing_key,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    fn provider(&self) -> Result<&Arc<dyn OAuthProvider>, AppError> {
        self.provider
            .as_ref()
            .ok_or_else(AppError::google_not_configured)
    }

    async fn lock_user(&self, user_id: Uuid) -> UserLockGuard {
        let lock = self
            .user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        UserLockGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.user_locks.clone(),
            user_id,
        }
    }

    // ─── Session Credentials ─────────────────────────────────────

    pub fn issue_session(&self, user: &User) -> Result<String, AppError> {
        create_session_token(user, &self.jwt_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    pub fn verify_session(&self, token: &str) -> Option<Claims> {
        verify_session_token(token, &self.jwt_signing_key)
    }

    /// Resolve the stored user behind a session credential.
    pub async fn user_from_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let Some(claims) = self.verify_session(token) else {
            return Ok(None);
        };
        self.store.find_user_by_id(claims.user_id).await
    }

    // ─── OAuth Flow ──────────────────────────────────────────────

    /// Start linking Google for an existing user.
    pub async fn begin_authorization(
        &self,
        user_id: Uuid,
        plan: PlanType,
    ) -> Result<AuthorizationRequest, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let provider = self.provider()?;

        let state = OAuthState::new(user_id, plan, Utc::now())?;
        let signed = state.sign(&self.state_secret)?;

        tracing::info!(user_id = %user_id, plan = %plan, "Starting Google OAuth flow");

        Ok(AuthorizationRequest {
            auth_url: provider.authorization_url(plan, &signed),
            nonce: state.nonce,
        })
    }

    /// Validate a callback `state` against the browser's nonce cookie.
    pub fn verify_state(
        &self,
        state: &str,
        cookie_nonce: Option<&str>,
    ) -> Result<OAuthState, StateError> {
        let decoded = OAuthState::verify(state, &self.state_secret, Utc::now())?;
        decoded.check_nonce(cookie_nonce)?;
        Ok(decoded)
    }

    /// Exchange an authorization code and attach the Google account to `user_id`.
    ///
    /// Steps run in order: find user, update email, upsert grant, issue
    /// session. Each write stands on its own; a failure part-way leaves the
    /// earlier writes in place.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        user_id: Uuid,
    ) -> Result<LinkedAccount, AppError> {
        let provider = self.provider()?;

        let _guard = self.lock_user(user_id).await;

        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let tokens = provider.exchange_code(code).await?;
        let profile = provider.fetch_profile(&tokens.access_token).await?;

        if user.google_email.as_deref() != Some(profile.email.as_str()) {
            user = self
                .store
                .update_user(
                    user.id,
                    &UserUpdate::google_identity(&profile.email, profile.name.clone()),
                )
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
        }

        let scope = tokens.scope.clone().unwrap_or_else(|| {
            scopes_for_plan(PlanType::Standard)
                .into_iter()
                .map(str::to_string)
                .collect()
        });

        let grant = self
            .store
            .upsert_grant(
                user.id,
                GrantUpsert {
                    access_token: tokens.access_token,
                    refresh_token: tokens.refresh_token,
                    expires_at: tokens.expires_at,
                    scope,
                    token_type: tokens.token_type,
                },
            )
            .await?;

        let session_token = self.issue_session(&user)?;

        tracing::info!(
            user_id = %user.id,
            has_refresh_token = grant.has_refresh_token(),
            "Google account linked"
        );

        Ok(LinkedAccount {
            user,
            grant,
            profile,
            session_token,
        })
    }

    /// Refresh the stored Google access token.
    pub async fn refresh_provider_token(&self, user_id: Uuid) -> Result<RefreshedToken, AppError> {
        let _guard = self.lock_user(user_id).await;

        let grant = self.store.find_grant(user_id).await?;
        let Some(refresh_token) = grant.and_then(|g| g.refresh_token).filter(|t| !t.is_empty())
        else {
            return Err(AppError::BadRequest("No refresh token available".to_string()));
        };

        let tokens = self
            .provider()?
            .refresh_access_token(&refresh_token)
            .await?;

        let updated = self
            .store
            .update_grant(
                user_id,
                &GrantUpdate {
                    access_token: Some(tokens.access_token.clone()),
                    refresh_token: tokens.refresh_token,
                    expires_at: tokens.expires_at,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Grant for user {user_id}")))?;

        tracing::info!(user_id = %user_id, "Google access token refreshed");

        Ok(RefreshedToken {
            access_token: updated.access_token,
            expires_at: updated.expires_at,
        })
    }

    /// Forget the stored grant. The token is not revoked with Google.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.store.delete_grant(user_id).await? {
            tracing::info!(user_id = %user_id, "Google grant deleted");
        }
        Ok(())
    }
}
