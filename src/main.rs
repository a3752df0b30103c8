use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use outing_api::api::{app, AppState};
use outing_api::auth::AuthenticationGate;
use outing_api::config::AppConfig;
use outing_api::database::{DatabaseManager, Repository};
use outing_api::services::RouteAggregationService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up MASTER_DSN, APP_SECRET_TOKEN, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!(
        "Starting outing-api in {:?} mode (strict signatures: {})",
        config.environment,
        config.security.strict_mode
    );
    tracing::debug!("Effective configuration: {}", serde_json::to_string(&config)?);

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to postgres")?;
    tracing::debug!("Success connection to database");

    let repository = Arc::new(Repository::new(db.clone()));
    let aggregation = Arc::new(
        RouteAggregationService::new(repository.clone(), config.aggregation_timeout())
            .with_concurrency(config.aggregation_concurrency()),
    );
    let gate = Arc::new(AuthenticationGate::new(config.gate_config()));

    let router = app(AppState::new(repository, aggregation), gate);

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.address))?;
    tracing::info!("Listening on http://{}", config.server.address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
