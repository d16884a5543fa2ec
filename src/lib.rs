// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mimo onboarding: signup backend for the Mimo WhatsApp assistant
//!
//! This crate provides the API that captures a user's phone number, links
//! their Google account over OAuth, and hands them off to WhatsApp, plus
//! the client-side signup flow that drives it.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod flow;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::DynStore;
use services::{IdentityService, OAuthProvider, OnboardingService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: IdentityService,
    pub onboarding: OnboardingService,
}

impl AppState {
    /// Wire the services over a store and an optional OAuth provider.
    pub fn new(
        config: Config,
        store: DynStore,
        provider: Option<Arc<dyn OAuthProvider>>,
    ) -> Self {
        let identity = IdentityService::new(
            store.clone(),
            provider,
            config.session_secret.clone(),
            config.jwt_signing_key.clone(),
        );
        let onboarding = OnboardingService::new(store, config.whatsapp_number.clone());

        Self {
            config,
            identity,
            onboarding,
        }
    }
}
