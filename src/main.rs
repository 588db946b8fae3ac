//! skillswap-gateway server entry point.
//!
//! Starts the Axum HTTP server with the REST endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use skillswap_gateway::api;
use skillswap_gateway::app_state::AppState;
use skillswap_gateway::auth::JwtVerifier;
use skillswap_gateway::config::{LogFormat, MarketConfig};
use skillswap_gateway::service::ProfileSettings;
use skillswap_gateway::store::{InMemoryStore, MarketStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MarketConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting skillswap-gateway");

    // Build storage layer
    let store: Arc<dyn MarketStore> = if config.persistence_enabled {
        let store = PostgresStore::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        tracing::info!("using PostgreSQL store");
        Arc::new(store)
    } else {
        tracing::warn!("PERSISTENCE_ENABLED is off; data lives in memory only");
        Arc::new(InMemoryStore::with_default_catalog())
    };

    // Build application state
    let settings = ProfileSettings {
        signup_bonus: config.signup_bonus,
        max_top_up: config.max_top_up,
        avatar_public_base_url: config.avatar_public_base_url.clone(),
    };
    let app_state = AppState::new(store, settings, JwtVerifier::new(&config.jwt_secret));

    // Build router
    let app = api::build_app(app_state, config.request_timeout_secs);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
