//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// `PostgreSQL` connection URL. Without it the server runs on the
    /// in-memory store.
    pub database_url: Option<String>,

    /// Upper bound on pooled database connections
    pub database_max_connections: u32,

    /// HS256 secret shared with the session service that issues access tokens
    pub jwt_secret: String,

    /// Default page size for moderation log listings
    pub audit_page_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            audit_page_limit: env::var("AUDIT_PAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        })
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            database_url: None,
            database_max_connections: 5,
            jwt_secret: "test-secret".into(),
            audit_page_limit: 50,
        }
    }
}
