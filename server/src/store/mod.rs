//! Persistence port for the moderation core.
//!
//! Every mutating method applies the state change and appends the audit entry
//! as one unit, and re-checks the source-state precondition inside that unit.
//! Two backends:
//! - [`PgModerationStore`]: `PostgreSQL` via sqlx transactions
//! - [`MemoryStore`]: in-process tables behind a single lock

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgModerationStore;

use crate::audit::{AuditDraft, LogFilter, ModerationAction};
use crate::moderation::types::{
    ArchivedPost, Category, CategoryChange, ForumUser, NewCategory, Post, PostChange,
    StandingChange,
};

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("slug '{0}' is already in use")]
    DuplicateSlug(String),

    /// A multi-write operation completed only part of its writes.
    #[error("consistency failure: {0}")]
    Consistency(String),

    #[error("snapshot encoding failed")]
    Snapshot(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a guarded single-row update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Applied(T),
    /// The row does not exist.
    Missing,
    /// The row exists but is no longer in the required source state.
    Rejected(T),
}

/// Result of a sibling order swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapResult {
    Swapped { moved: Category, displaced: Category },
    Missing,
    /// The two rows no longer share a parent.
    NotSiblings,
}

/// Result of moving a post into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveResult {
    Archived(ArchivedPost),
    Missing,
    NotSoftDeleted(Post),
}

#[async_trait]
pub trait ModerationStore: Send + Sync {
    // Users
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<ForumUser>>;
    async fn update_standing(
        &self,
        id: Uuid,
        change: &StandingChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<ForumUser>>;

    // Posts
    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>>;
    async fn apply_post_change(
        &self,
        id: Uuid,
        change: PostChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Post>>;
    /// Write the tombstone, then delete the live row.
    async fn archive_post(
        &self,
        id: Uuid,
        archived_by: Uuid,
        at: DateTime<Utc>,
        draft: AuditDraft,
    ) -> StoreResult<ArchiveResult>;
    async fn find_tombstone(&self, original_id: Uuid) -> StoreResult<Option<ArchivedPost>>;
    /// Active posts with at least one report, most reported first.
    async fn list_reported_posts(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>>;

    // Categories
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    /// All categories, top-level first, each sibling set by `display_order`.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    /// One sibling set ordered by `display_order`.
    async fn list_siblings(&self, parent_id: Option<Uuid>) -> StoreResult<Vec<Category>>;
    /// Insert at the end of the sibling set.
    async fn insert_category(&self, new: &NewCategory, draft: AuditDraft) -> StoreResult<Category>;
    /// Exchange the current `display_order` values of two siblings.
    async fn swap_display_order(
        &self,
        moved: Uuid,
        displaced: Uuid,
        draft: AuditDraft,
    ) -> StoreResult<SwapResult>;
    async fn update_category(
        &self,
        id: Uuid,
        change: CategoryChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Category>>;

    // Moderation log
    async fn list_moderation_log(&self, filter: &LogFilter) -> StoreResult<Vec<ModerationAction>>;
    async fn count_moderation_log(&self, filter: &LogFilter) -> StoreResult<i64>;
    /// The whole log in append order.
    async fn moderation_log_chain(&self) -> StoreResult<Vec<ModerationAction>>;
}
