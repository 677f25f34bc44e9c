//! Biblioteca Server - library lending REST API

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblioteca_server::{
    api,
    config::AppConfig,
    repository::{self, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "biblioteca_server={},tower_http=debug",
            config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Biblioteca Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = repository::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(url = %config.database.url, "Connected to database");

    repository::migrate(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed");

    let services = Services::new(Repository::new(pool.clone()), config.auth.clone());
    services
        .users
        .ensure_admin()
        .await
        .context("Failed to bootstrap administrator")?;

    let addr = SocketAddr::new(
        config.server.host.parse::<IpAddr>().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
