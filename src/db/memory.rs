// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and local runs without PostgreSQL.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{GoogleTokenGrant, GrantUpdate, GrantUpsert, User, UserUpdate};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Store backed by concurrent maps.
///
/// The phone index plays the role of the unique constraint: find-or-create
/// goes through a single map entry, so concurrent callers see one user.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<Uuid, User>>,
    phones: Arc<DashMap<String, Uuid>>,
    grants: Arc<DashMap<Uuid, GoogleTokenGrant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_user_by_phone(&self, whatsapp_number: &str) -> Result<Option<User>, AppError> {
        let Some(id) = self.phones.get(whatsapp_number).map(|id| *id) else {
            return Ok(None);
        };
        self.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.google_email.as_deref() == Some(email))
            .map(|u| u.clone()))
    }

    async fn find_or_create_user_by_phone(&self, whatsapp_number: &str) -> Result<User, AppError> {
        let id = *self
            .phones
            .entry(whatsapp_number.to_string())
            .or_insert_with(|| {
                let user = User::new(whatsapp_number, Utc::now());
                let id = user.id;
                self.users.insert(id, user);
                id
            });

        self.users
            .get(&id)
            .map(|u| u.clone())
            .ok_or_else(|| AppError::Database(format!("phone index points at missing user {id}")))
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, AppError> {
        let Some(current_number) = self.users.get(&id).map(|u| u.whatsapp_number.clone()) else {
            return Ok(None);
        };

        if let Some(number) = update
            .whatsapp_number
            .as_ref()
            .filter(|n| **n != current_number)
        {
            match self.phones.entry(number.clone()) {
                Entry::Occupied(_) => {
                    return Err(AppError::Conflict(
                        "Phone number already registered".to_string(),
                    ))
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.phones.remove(&current_number);
        }

        Ok(self.users.get_mut(&id).map(|mut user| {
            update.apply(&mut user, Utc::now());
            user.clone()
        }))
    }

    async fn find_grant(&self, user_id: Uuid) -> Result<Option<GoogleTokenGrant>, AppError> {
        Ok(self.grants.get(&user_id).map(|g| g.clone()))
    }

    async fn upsert_grant(
        &self,
        user_id: Uuid,
        grant: GrantUpsert,
    ) -> Result<GoogleTokenGrant, AppError> {
        if !self.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User {user_id}")));
        }

        let now = Utc::now();
        let merged = match self.grants.entry(user_id) {
            Entry::Occupied(mut existing) => {
                let merged = grant.merge(Some(existing.get()), user_id, now);
                existing.insert(merged.clone());
                merged
            }
            Entry::Vacant(slot) => slot.insert(grant.merge(None, user_id, now)).clone(),
        };

        Ok(merged)
    }

    async fn update_grant(
        &self,
        user_id: Uuid,
        update: &GrantUpdate,
    ) -> Result<Option<GoogleTokenGrant>, AppError> {
        Ok(self.grants.get_mut(&user_id).map(|mut grant| {
            update.apply(&mut grant, Utc::now());
            grant.clone()
        }))
    }

    async fn delete_grant(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.grants.remove(&user_id).is_some())
    }
}
