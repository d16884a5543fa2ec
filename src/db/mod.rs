// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer.
//!
//! Request handlers and services reach the database only through [`Store`].

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::models::{GoogleTokenGrant, GrantUpdate, GrantUpsert, User, UserUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Key-based access to users and their Google grants.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_phone(&self, whatsapp_number: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Idempotent under concurrent calls for the same number.
    async fn find_or_create_user_by_phone(&self, whatsapp_number: &str) -> Result<User, AppError>;

    /// Rewrite only the supplied fields. Returns `None` if the user does not exist.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, AppError>;

    async fn find_grant(&self, user_id: Uuid) -> Result<Option<GoogleTokenGrant>, AppError>;

    /// Insert or replace the grant, keeping the stored refresh token if none is supplied.
    async fn upsert_grant(
        &self,
        user_id: Uuid,
        grant: GrantUpsert,
    ) -> Result<GoogleTokenGrant, AppError>;

    async fn update_grant(
        &self,
        user_id: Uuid,
        update: &GrantUpdate,
    ) -> Result<Option<GoogleTokenGrant>, AppError>;

    /// Returns true if a grant was deleted.
    async fn delete_grant(&self, user_id: Uuid) -> Result<bool, AppError>;
}

/// Shared store handle for use in AppState.
pub type DynStore = Arc<dyn Store>;
