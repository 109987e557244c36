mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use routes::{app_router, AppState};
use tally_core::services::LedgerService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tally_api=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting tally-api with config: {:?}", config);

    let ledger = LedgerService::open_path(&config.database_path, config.engine).await?;
    let state = AppState::new(config, ledger);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tally-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
