mod config;
mod error;
mod rate_limit;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use routes::{app_router, AppState};
use till_core::{DatabaseService, SyncService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("till_api=info".parse()?)
                .add_directive("till_core=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting till-api with config: {:?}", config);

    let database = DatabaseService::open_path(&config.db_path).await?;
    let sync = SyncService::new(database, config.sync);

    // Replay whatever a previous run left queued
    match sync.drain().await {
        Ok(report) if !report.is_clean() => tracing::warn!(
            unresolved = report.failed_ids().len(),
            "Startup drain left operations queued"
        ),
        Ok(_) => {}
        Err(error) => tracing::error!("Startup drain failed: {error}"),
    }

    let state = AppState::new(config.clone(), sync);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("till-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
