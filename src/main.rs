// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

use crate::application::analytics_service::AnalyticsService;
use crate::application::battery_service::BatteryService;
use crate::application::dataset_cache::DatasetCache;
use crate::infrastructure::battery_api_repository::BatteryApiRepository;
use crate::infrastructure::config::load_config;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;
    let defaults = config.analytics.options()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(BatteryApiRepository::new(
        config.api.base_url.clone(),
        config.api.batch_size,
        config.api.max_pages,
        Duration::from_secs(config.api.timeout_secs),
    )?);

    // Create services (application layer)
    let battery_service = BatteryService::new(config.api.authorized_imeis.clone());
    let cache = Arc::new(DatasetCache::new(config.analytics.cache_ttl()));
    let analytics_service =
        AnalyticsService::new(repository, battery_service.clone(), cache, defaults);

    // Create application state
    let state = Arc::new(AppState {
        battery_service,
        analytics_service,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server.bind_address.parse()?;
    tracing::info!(
        "Starting battery-analytics service on {} (upstream {})",
        addr,
        config.api.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
