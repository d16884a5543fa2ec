// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Optional integrations (Google OAuth, PostgreSQL) do not abort start-up
//! when unset; the requests that depend on them fail with a configuration
//! error instead.

use std::env;

/// Default Mimo WhatsApp contact number (international format, no `+`).
pub const DEFAULT_WHATSAPP_NUMBER: &str = "972501234567";

/// Default OAuth callback registered with Google for local development.
pub const DEFAULT_GOOGLE_REDIRECT_URI: &str = "http://localhost:3001/api/auth/google/callback";

/// Google OAuth client credentials.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub ssl: bool,
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Build the connection URL.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let ssl_mode = if self.ssl { "require" } else { "disable" };
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.name,
            ssl_mode
        )
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// WhatsApp number users are handed off to
    pub whatsapp_number: String,

    /// Google OAuth client (None when credentials are absent)
    pub google: Option<GoogleOAuthConfig>,
    /// Database settings (None when credentials are absent)
    pub database: Option<DatabaseConfig>,

    // --- Secrets ---
    /// HMAC key for signing OAuth state tokens (raw bytes)
    pub session_secret: Vec<u8>,
    /// JWT signing key for session credentials (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 3001,
            whatsapp_number: DEFAULT_WHATSAPP_NUMBER.to_string(),
            google: Some(GoogleOAuthConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_client_secret".to_string(),
                redirect_uri: DEFAULT_GOOGLE_REDIRECT_URI.to_string(),
            }),
            database: None,
            session_secret: b"test_session_secret_32_bytes!!!!".to_vec(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = env::var("SERVER_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3001".to_string());
        let port = port
            .parse()
            .map_err(|_| ConfigError::Invalid("SERVER_PORT", port))?;

        let google = google_from_env();
        if google.is_none() {
            tracing::warn!(
                "Google OAuth credentials not found; set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET \
                 (https://console.cloud.google.com/apis/credentials)"
            );
        }

        let database = database_from_env()?;
        if database.is_none() {
            tracing::warn!(
                "Database credentials not found; set DATABASE_URL or DB_HOST, DB_USER and DB_PASSWORD"
            );
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port,
            whatsapp_number: env::var("MIMO_WHATSAPP_NUMBER")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| DEFAULT_WHATSAPP_NUMBER.to_string()),
            google,
            database,
            session_secret: required_secret("SESSION_SECRET")?,
            jwt_signing_key: required_secret("JWT_SECRET")?,
        })
    }
}

fn required_secret(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.as_bytes().to_vec())
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn google_from_env() -> Option<GoogleOAuthConfig> {
    let client_id = non_empty("GOOGLE_CLIENT_ID")?;
    let client_secret = non_empty("GOOGLE_CLIENT_SECRET")?;
    let redirect_uri = non_empty("GOOGLE_REDIRECT_URI")
        .unwrap_or_else(|| DEFAULT_GOOGLE_REDIRECT_URI.to_string());

    Some(GoogleOAuthConfig {
        client_id,
        client_secret,
        redirect_uri,
    })
}

fn database_from_env() -> Result<Option<DatabaseConfig>, ConfigError> {
    let url = non_empty("DATABASE_URL");
    let host = non_empty("DB_HOST");
    let user = non_empty("DB_USER");
    let password = non_empty("DB_PASSWORD");

    if url.is_none() && (host.is_none() || user.is_none() || password.is_none()) {
        return Ok(None);
    }

    let port = non_empty("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let port = port
        .parse()
        .map_err(|_| ConfigError::Invalid("DB_PORT", port))?;

    Ok(Some(DatabaseConfig {
        host: host.unwrap_or_default(),
        port,
        name: non_empty("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
        user: user.unwrap_or_default(),
        password: password.unwrap_or_default(),
        ssl: non_empty("DB_SSL").is_some_and(|v| v == "true"),
        url,
    }))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
