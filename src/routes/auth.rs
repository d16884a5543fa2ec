// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth and session routes.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    middleware,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::auth::{bearer_token, optional_auth, require_auth};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::{PlanType, User};
use crate::services::oauth_state::STATE_TTL_SECS;
use crate::AppState;

/// Cookie holding the OAuth nonce between the start and the callback.
pub const NONCE_COOKIE: &str = "mimo_oauth_nonce";

/// Path the nonce cookie is scoped to.
pub const CALLBACK_PATH: &str = "/api/auth/google/callback";

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/refresh", post(refresh))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let optional = Router::new()
        .route("/api/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state, optional_auth));

    Router::new()
        .route("/api/auth/google", get(auth_start))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/api/auth/verify", get(verify))
        .merge(protected)
        .merge(optional)
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStartParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    plan_type: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// Start OAuth flow: hand back the Google consent URL and set the nonce cookie.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<AuthStartParams>,
) -> Result<(CookieJar, Json<AuthUrlResponse>)> {
    let user_id: Uuid = params
        .user_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("userId is required".to_string()))?
        .parse()
        .map_err(|_| AppError::BadRequest("userId is not a valid id".to_string()))?;

    let plan = match params.plan_type.as_deref().filter(|p| !p.is_empty()) {
        Some(plan) => plan
            .parse::<PlanType>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => PlanType::default(),
    };

    let request = state.identity.begin_authorization(user_id, plan).await?;

    let cookie = Cookie::build((NONCE_COOKIE, request.nonce))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.frontend_url.starts_with("https://"))
        .path(CALLBACK_PATH)
        .max_age(time::Duration::seconds(STATE_TTL_SECS))
        .build();

    Ok((
        jar.add(cookie),
        Json(AuthUrlResponse {
            auth_url: request.auth_url,
        }),
    ))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((NONCE_COOKIE, "")).path(CALLBACK_PATH).build()
}

/// OAuth callback: verify state, exchange code, redirect with a session token.
///
/// Every outcome is a redirect to the frontend signup page; errors travel as
/// an `error` query parameter.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let signup_url = format!("{}/signup", state.config.frontend_url.trim_end_matches('/'));
    let error_redirect = |code: &str| {
        Redirect::temporary(&format!(
            "{}?error={}",
            signup_url,
            urlencoding::encode(code)
        ))
    };

    let cookie_nonce = jar.get(NONCE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(removal_cookie());

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return (jar, error_redirect(&error));
    }

    let oauth_state = match state.identity.verify_state(
        params.state.as_deref().unwrap_or_default(),
        cookie_nonce.as_deref(),
    ) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(reason = %e, "Rejected OAuth state");
            return (jar, error_redirect(e.redirect_code()));
        }
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!(user_id = %oauth_state.user_id, "OAuth callback without code");
        return (jar, error_redirect("auth_failed"));
    };

    match state
        .identity
        .exchange_authorization_code(&code, oauth_state.user_id)
        .await
    {
        Ok(linked) => {
            let step = if linked.user.onboarding_complete {
                "completed"
            } else {
                "whatsapp_redirect"
            };
            let redirect = format!(
                "{}?token={}&step={}",
                signup_url,
                urlencoding::encode(&linked.session_token),
                step
            );
            (jar, Redirect::temporary(&redirect))
        }
        Err(e) => {
            tracing::error!(
                user_id = %oauth_state.user_id,
                error = %e,
                "OAuth code exchange failed"
            );
            (jar, error_redirect(e.redirect_code()))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub whatsapp_number: String,
    pub plan_type: PlanType,
    pub onboarding_complete: bool,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.google_email,
            name: user.google_name,
            whatsapp_number: user.whatsapp_number,
            plan_type: user.plan_type,
            onboarding_complete: user.onboarding_complete,
        }
    }
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: SessionUser,
}

/// The user behind the session credential, looked up fresh from the store.
async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    let user = state
        .identity
        .user_from_token(token)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    Ok(Json(MeResponse { user: user.into() }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokens {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub tokens: AccessTokens,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<RefreshResponse>> {
    let refreshed = state.identity.refresh_provider_token(auth.user_id).await?;
    Ok(Json(RefreshResponse {
        tokens: AccessTokens {
            access_token: refreshed.access_token,
            expires_at: refreshed.expires_at,
        },
    }))
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Logout: drop the stored grant when the caller is known. Always succeeds.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(MaybeAuthUser(auth)): Extension<MaybeAuthUser>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(auth) = auth {
        if let Err(e) = state.identity.revoke(auth.user_id).await {
            tracing::warn!(user_id = %auth.user_id, error = %e, "Failed to delete grant on logout");
        }
    }

    (
        jar.remove(removal_cookie()),
        Json(SuccessResponse { success: true }),
    )
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Check a session credential. Always 200.
async fn verify(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<VerifyResponse> {
    let claims = bearer_token(&headers).and_then(|t| state.identity.verify_session(t));

    Json(match claims {
        Some(claims) => VerifyResponse {
            valid: true,
            user_id: Some(claims.user_id),
            email: claims.email,
        },
        None => VerifyResponse {
            valid: false,
            user_id: None,
            email: None,
        },
    })
}

