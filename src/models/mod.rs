// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod grant;
pub mod user;

pub use grant::{GoogleTokenGrant, GrantUpdate, GrantUpsert, GOOGLE_PROVIDER};
pub use user::{PlanType, User, UserUpdate, UserView};
