// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User onboarding routes: phone capture, profile, completion, WhatsApp link.

use axum::{
    extract::{Query, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{optional_auth, require_auth};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::UserView;
use crate::routes::ApiJson;
use crate::services::onboarding::WhatsAppInfo;
use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/api/users/me", get(get_me))
        .route(
            "/api/users/me/complete-onboarding",
            post(complete_onboarding),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let optional = Router::new()
        .route("/api/users/me/phone", put(update_phone))
        .route_layer(middleware::from_fn_with_state(state, optional_auth));

    Router::new()
        .route("/api/users/check-phone", post(check_phone))
        .route("/api/users/whatsapp-info", get(whatsapp_info))
        .merge(protected)
        .merge(optional)
}

/// Phone number submission body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 32, message = "Phone number is required"))]
    pub phone_number: String,
}

impl PhoneRequest {
    fn validated(&self) -> Result<&str> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(&self.phone_number)
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: UserView,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = state.onboarding.get_user(auth.user_id).await?;
    Ok(Json(UserResponse {
        user: UserView::from(&user),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CheckPhoneResponse {
    pub user: UserView,
    pub has_google_connection: bool,
    pub jwt_token: String,
    pub should_connect_google: bool,
}

/// Find or create the user for a phone number and issue a session credential.
async fn check_phone(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<PhoneRequest>,
) -> Result<Json<CheckPhoneResponse>> {
    let check = state.onboarding.check_phone(body.validated()?).await?;
    let jwt_token = state.identity.issue_session(&check.user)?;

    Ok(Json(CheckPhoneResponse {
        user: UserView::from(&check.user),
        has_google_connection: check.has_google_connection,
        jwt_token,
        should_connect_google: !check.has_google_connection,
    }))
}

async fn update_phone(
    State(state): State<Arc<AppState>>,
    Extension(MaybeAuthUser(auth)): Extension<MaybeAuthUser>,
    ApiJson(body): ApiJson<PhoneRequest>,
) -> Result<Json<UserResponse>> {
    let user = state
        .onboarding
        .set_phone(auth.map(|a| a.user_id), body.validated()?)
        .await?;

    Ok(Json(UserResponse {
        user: UserView::from(&user),
    }))
}

#[derive(Serialize)]
pub struct CompleteOnboardingResponse {
    pub user: UserView,
    pub whatsapp: WhatsAppInfo,
}

async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<CompleteOnboardingResponse>> {
    let user = state.onboarding.complete_onboarding(auth.user_id).await?;

    Ok(Json(CompleteOnboardingResponse {
        user: UserView::from(&user),
        whatsapp: state.onboarding.whatsapp_info(None),
    }))
}

#[derive(Deserialize)]
pub struct WhatsAppParams {
    #[serde(default)]
    message: Option<String>,
}

async fn whatsapp_info(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WhatsAppParams>,
) -> Json<WhatsAppInfo> {
    Json(state.onboarding.whatsapp_info(params.message.as_deref()))
}
