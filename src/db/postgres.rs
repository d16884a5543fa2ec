// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL store.
//!
//! Uniqueness of users by WhatsApp number is enforced by the `users`
//! unique constraint; find-or-create is a single `INSERT .. ON CONFLICT`
//! statement so concurrent first submissions converge on one row.

use crate::config::DatabaseConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{GoogleTokenGrant, GrantUpdate, GrantUpsert, User, UserUpdate, GOOGLE_PROVIDER};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const MAX_CONNECTIONS: u32 = 20;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Option<PgPool>,
}

impl PgStore {
    /// Connect to PostgreSQL and run pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        tracing::info!(host = %config.host, database = %config.name, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .connect(&config.connection_url())
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool (migrations are the caller's responsibility).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// Store without database credentials.
    ///
    /// Every operation fails with a configuration error.
    pub fn unconfigured() -> Self {
        Self { pool: None }
    }

    fn pool(&self) -> Result<&PgPool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(AppError::database_not_configured)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool()?)
                .await?,
        )
    }

    async fn find_user_by_phone(&self, whatsapp_number: &str) -> Result<Option<User>, AppError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE whatsapp_number = $1")
                .bind(whatsapp_number)
                .fetch_optional(self.pool()?)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_email = $1 LIMIT 1")
                .bind(email)
                .fetch_optional(self.pool()?)
                .await?,
        )
    }

    async fn find_or_create_user_by_phone(&self, whatsapp_number: &str) -> Result<User, AppError> {
        // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, whatsapp_number)
             VALUES ($1, $2)
             ON CONFLICT (whatsapp_number)
             DO UPDATE SET whatsapp_number = EXCLUDED.whatsapp_number
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(whatsapp_number)
        .fetch_one(self.pool()?)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET
                whatsapp_number = COALESCE($2, whatsapp_number),
                google_email = COALESCE($3, google_email),
                google_name = COALESCE($4, google_name),
                plan_type = COALESCE($5, plan_type),
                timezone = COALESCE($6, timezone),
                onboarding_complete = onboarding_complete OR $7,
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.whatsapp_number.as_deref())
        .bind(update.google_email.as_deref())
        .bind(update.google_name.as_deref())
        .bind(update.plan_type.map(|p| p.as_str()))
        .bind(update.timezone.as_deref())
        .bind(update.complete_onboarding)
        .fetch_optional(self.pool()?)
        .await?;

        Ok(user)
    }

    async fn find_grant(&self, user_id: Uuid) -> Result<Option<GoogleTokenGrant>, AppError> {
        Ok(sqlx::query_as::<_, GoogleTokenGrant>(
            "SELECT * FROM user_google_tokens WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .fetch_optional(self.pool()?)
        .await?)
    }

    async fn upsert_grant(
        &self,
        user_id: Uuid,
        grant: GrantUpsert,
    ) -> Result<GoogleTokenGrant, AppError> {
        let refresh_token = grant.refresh_token.filter(|t| !t.is_empty());

        Ok(sqlx::query_as::<_, GoogleTokenGrant>(
            "INSERT INTO user_google_tokens (
                id, user_id, provider, access_token, refresh_token,
                expires_at, scope, token_type
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, user_google_tokens.refresh_token),
                expires_at = EXCLUDED.expires_at,
                scope = EXCLUDED.scope,
                token_type = EXCLUDED.token_type,
                updated_at = NOW()
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .bind(&grant.access_token)
        .bind(refresh_token)
        .bind(grant.expires_at)
        .bind(&grant.scope)
        .bind(grant.token_type.as_deref().unwrap_or("Bearer"))
        .fetch_one(self.pool()?)
        .await?)
    }

    async fn update_grant(
        &self,
        user_id: Uuid,
        update: &GrantUpdate,
    ) -> Result<Option<GoogleTokenGrant>, AppError> {
        Ok(sqlx::query_as::<_, GoogleTokenGrant>(
            "UPDATE user_google_tokens SET
                access_token = COALESCE($3, access_token),
                refresh_token = COALESCE(NULLIF($4, ''), refresh_token),
                expires_at = COALESCE($5, expires_at),
                updated_at = NOW()
             WHERE user_id = $1 AND provider = $2
             RETURNING *",
        )
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .bind(update.access_token.as_deref())
        .bind(update.refresh_token.as_deref())
        .bind(update.expires_at)
        .fetch_optional(self.pool()?)
        .await?)
    }

    async fn delete_grant(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM user_google_tokens WHERE user_id = $1 AND provider = $2")
                .bind(user_id)
                .bind(GOOGLE_PROVIDER)
                .execute(self.pool()?)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_reports_configuration_error() {
        let store = PgStore::unconfigured();
        let err = store
            .find_user_by_phone("+972501234567")
            .await
            .expect_err("should fail without a pool");
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
