//! Database Layer
//!
//! `PostgreSQL` connection pool and migrations.
//!
//! Advisory Lock Seed Registry
//! - 61 = `moderation_log` append (one global key, serializes the hash chain)
//!   - Called from: server/src/store/postgres.rs (`append_log`)
//! - 63 = `category_insert` (keyed by parent id, `root` for top level)
//!   - Called from: server/src/store/postgres.rs (`insert_category`)

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
