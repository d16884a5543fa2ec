// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod google;
pub mod identity;
pub mod oauth_state;
pub mod onboarding;
pub mod phone;
pub mod session;

pub use google::{GoogleClient, OAuthProvider, ProviderProfile, ProviderTokens};
pub use identity::{IdentityService, LinkedAccount, RefreshedToken};
pub use oauth_state::{OAuthState, StateError};
pub use onboarding::{OnboardingService, WhatsAppInfo};
