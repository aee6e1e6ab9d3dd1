//! Forum Moderation
//!
//! Three engines share the role resolver and the moderation log:
//! - `posts`: post lifecycle (hide, pin, soft delete, restore, archive)
//! - `categories`: category tree ordering and archival
//! - `users`: bans, read-only mode and moderator grants

pub mod categories;
mod error;
pub mod handlers;
pub mod posts;
pub mod types;
pub mod users;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::AppState;

pub use error::ModerationError;

/// Forum moderation routes, mounted under `/api/forum` behind auth.
pub fn router() -> Router<AppState> {
    Router::new()
        // Posts
        .route("/posts/{id}", get(handlers::get_post))
        .route("/posts/{id}/hidden", post(handlers::toggle_hidden))
        .route("/posts/{id}/pin", post(handlers::toggle_local_pin))
        .route("/posts/{id}/global-pin", post(handlers::toggle_global_pin))
        .route("/posts/{id}/delete", post(handlers::soft_delete))
        .route("/posts/{id}/restore", post(handlers::restore))
        .route("/posts/{id}/archive", post(handlers::archive))
        .route("/queue", get(handlers::moderation_queue))
        .route("/archive/{original_id}", get(handlers::get_tombstone))
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/categories/{id}/move", post(handlers::move_category))
        .route("/categories/{id}/archive", post(handlers::archive_category))
        .route("/categories/{id}/active", put(handlers::set_category_active))
        // Users
        .route(
            "/users/{id}/ban",
            post(handlers::ban_user).delete(handlers::unban_user),
        )
        .route("/users/{id}/read-only", post(handlers::toggle_read_only))
        .route(
            "/users/{id}/moderator",
            put(handlers::grant_moderator).delete(handlers::revoke_moderator),
        )
}
