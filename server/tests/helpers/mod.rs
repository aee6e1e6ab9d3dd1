//! Reusable test helpers for moderation integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router over an in-memory store, plus fixtures for users, posts and
//! categories and HS256 access-token minting.
//!
//! ## Postgres
//!
//! Use [`pg_store()`] in `#[ignore]` tests; it reads `DATABASE_URL` and runs
//! migrations once per test binary.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use portal_server::api::{create_router, AppState};
use portal_server::auth::jwt::{Claims, TokenType};
use portal_server::config::Config;
use portal_server::db;
use portal_server::moderation::types::{Category, ForumUser, Post};
use portal_server::permissions::{Actor, RoleTier};
use portal_server::store::{MemoryStore, PgModerationStore};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config.clone());
        let router = create_router(state);

        Self {
            router,
            store,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send an authenticated request with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user_id: Uuid,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let token = generate_access_token(&self.config, user_id);
        let builder = Self::request(method, uri).header("Authorization", format!("Bearer {token}"));
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.oneshot(request).await
    }

    /// Seed a user holding `tier` and return it.
    pub async fn user(&self, tier: RoleTier) -> ForumUser {
        let user = forum_user(tier);
        self.store.seed_user(user.clone()).await;
        user
    }

    /// Seed an active post authored by `author_id`.
    pub async fn post(&self, author_id: Uuid) -> Post {
        let post = live_post(author_id);
        self.store.seed_post(post.clone()).await;
        post
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

// ============================================================================
// Auth helpers
// ============================================================================

/// Mint an access token the way the session service does.
pub fn generate_access_token(config: &Config, user_id: Uuid) -> String {
    mint_token(config, user_id, TokenType::Access, 900)
}

pub fn mint_token(config: &Config, user_id: Uuid, typ: TokenType, ttl_seconds: i64) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        iat: now.timestamp(),
        typ,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .expect("Failed to encode token")
}

// ============================================================================
// Fixtures
// ============================================================================

/// A user record whose role flags resolve to `tier`.
pub fn forum_user(tier: RoleTier) -> ForumUser {
    let id = Uuid::now_v7();
    let now = Utc::now();
    ForumUser {
        id,
        username: format!("user_{}", &id.simple().to_string()[24..]),
        is_super_admin: tier == RoleTier::SuperAdmin,
        is_forum_admin: tier == RoleTier::ForumAdmin,
        is_forum_moderator: tier == RoleTier::Moderator,
        is_banned: false,
        is_read_only: false,
        ban_reason: None,
        banned_at: None,
        banned_by: None,
        created_at: now,
        updated_at: now,
    }
}

/// An active, visible, unpinned post.
pub fn live_post(author_id: Uuid) -> Post {
    let now = Utc::now();
    Post {
        id: Uuid::now_v7(),
        category_id: None,
        author_id,
        title: "Harbour festival volunteers".to_string(),
        body: "Sign-up sheet is at the library desk.".to_string(),
        is_hidden: false,
        is_pinned: false,
        global_pinned: false,
        reported_count: 0,
        deleted_at: None,
        deleted_by: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// A category row with an explicit `display_order`.
pub fn category(parent_id: Option<Uuid>, slug: &str, display_order: i32) -> Category {
    let now = Utc::now();
    Category {
        id: Uuid::now_v7(),
        parent_id,
        slug: slug.to_string(),
        name: slug.to_string(),
        description: None,
        display_order,
        is_active: true,
        is_archived: false,
        created_at: now,
        updated_at: now,
    }
}

/// Actor snapshot for a seeded user.
pub fn actor(user: &ForumUser) -> Actor {
    Actor::from(user)
}

/// Standalone actor at `tier` that has no user record.
pub fn actor_with_tier(tier: RoleTier) -> Actor {
    Actor {
        id: Uuid::now_v7(),
        username: format!("{tier}_actor"),
        tier,
        is_banned: false,
        is_read_only: false,
    }
}

// ============================================================================
// Postgres (ignored tests only)
// ============================================================================

static SHARED_POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Shared, migrated pool from `DATABASE_URL`.
pub async fn shared_pool() -> &'static PgPool {
    SHARED_POOL
        .get_or_init(|| async {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
            let pool = db::create_pool(&url, 5)
                .await
                .expect("Failed to connect to test DB");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
            pool
        })
        .await
}

pub async fn pg_store() -> PgModerationStore {
    PgModerationStore::new(shared_pool().await.clone())
}

/// Insert a user row directly (registration is outside this service).
pub async fn insert_pg_user(pool: &PgPool, tier: RoleTier) -> ForumUser {
    let user = forum_user(tier);
    sqlx::query(
        r"INSERT INTO users (id, username, is_super_admin, is_forum_admin, is_forum_moderator)
           VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(user.is_super_admin)
    .bind(user.is_forum_admin)
    .bind(user.is_forum_moderator)
    .execute(pool)
    .await
    .expect("Failed to insert user");
    user
}

/// Insert an active post row directly (authoring is outside this service).
pub async fn insert_pg_post(pool: &PgPool, author_id: Uuid) -> Uuid {
    let post = live_post(author_id);
    sqlx::query("INSERT INTO posts (id, author_id, title, body) VALUES ($1, $2, $3, $4)")
        .bind(post.id)
        .bind(author_id)
        .bind(&post.title)
        .bind(&post.body)
        .execute(pool)
        .await
        .expect("Failed to insert post");
    post.id
}
