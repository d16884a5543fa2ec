// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mimo onboarding API server
//!
//! Serves the signup API: phone capture, Google account linking and the
//! WhatsApp handoff.

use mimo_onboarding::{
    config::Config,
    db::{DynStore, PgStore},
    services::{GoogleClient, OAuthProvider},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Mimo onboarding API");

    // Connect to Postgres; without credentials every store call reports a config error
    let store: DynStore = match &config.database {
        Some(db_config) => Arc::new(PgStore::connect(db_config).await?),
        None => {
            tracing::warn!("Running without a database");
            Arc::new(PgStore::unconfigured())
        }
    };

    let provider: Option<Arc<dyn OAuthProvider>> = match &config.google {
        Some(google) => {
            tracing::info!(redirect_uri = %google.redirect_uri, "Google OAuth configured");
            Some(Arc::new(GoogleClient::new(google)?))
        }
        None => None,
    };

    let port = config.port;
    let state = Arc::new(AppState::new(config, store, provider));

    // Build router
    let app = mimo_onboarding::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mimo_onboarding=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
