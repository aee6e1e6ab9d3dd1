//! Portal Server - Main Entry Point

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use portal_server::store::{MemoryStore, ModerationStore, PgModerationStore};
use portal_server::{api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Portal Server"
    );

    // Initialize store
    let store: Arc<dyn ModerationStore> = if let Some(url) = &config.database_url {
        let pool = db::create_pool(url, config.database_max_connections).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgModerationStore::new(pool))
    } else {
        warn!("DATABASE_URL not set, using in-memory store. State is lost on restart.");
        Arc::new(MemoryStore::new())
    };

    // Build application state
    let state = api::AppState::new(store, config.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
