//! In-process store.
//!
//! All tables sit behind one lock, so every method is observed atomically by
//! readers. Used by tests and by the binary when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ArchiveResult, Guarded, ModerationStore, StoreError, StoreResult, SwapResult};
use crate::audit::{ActionType, AuditDraft, LogFilter, ModerationAction, GENESIS_HASH};
use crate::moderation::types::{
    ArchivedPost, Category, CategoryChange, ForumUser, NewCategory, Post, PostChange,
    StandingChange,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, ForumUser>,
    posts: HashMap<Uuid, Post>,
    tombstones: Vec<ArchivedPost>,
    categories: HashMap<Uuid, Category>,
    log: Vec<ModerationAction>,
    interrupt_next_archive: bool,
}

impl Tables {
    fn append(&mut self, draft: AuditDraft, action: ActionType, at: DateTime<Utc>) {
        let prev = self
            .log
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone());
        self.log.push(draft.seal(action, &prev, at));
    }
}

/// In-memory [`ModerationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record (account registration is external).
    pub async fn seed_user(&self, user: ForumUser) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Insert or replace a live post (post authoring is external).
    pub async fn seed_post(&self, post: Post) {
        self.tables.lock().await.posts.insert(post.id, post);
    }

    /// Insert a category row as-is, without auditing.
    pub async fn seed_category(&self, category: Category) {
        self.tables
            .lock()
            .await
            .categories
            .insert(category.id, category);
    }

    /// Number of tombstones recorded for `original_id`.
    pub async fn tombstone_count(&self, original_id: Uuid) -> usize {
        self.tables
            .lock()
            .await
            .tombstones
            .iter()
            .filter(|t| t.original_id == original_id)
            .count()
    }

    /// Make the next archive stop after the tombstone write, as a backend
    /// without transactions would if it crashed between the two writes.
    pub async fn interrupt_next_archive(&self) {
        self.tables.lock().await.interrupt_next_archive = true;
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<ForumUser>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn update_standing(
        &self,
        id: Uuid,
        change: &StandingChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<ForumUser>> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if !change.guard(user) {
            return Ok(Guarded::Rejected(user.clone()));
        }
        change.apply(user, now);
        let after = user.clone();

        tables.append(draft, change.audit_action(&after), now);
        Ok(Guarded::Applied(after))
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.tables.lock().await.posts.get(&id).cloned())
    }

    async fn apply_post_change(
        &self,
        id: Uuid,
        change: PostChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Post>> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let archiving = tables.tombstones.iter().any(|t| t.original_id == id);
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        // A tombstone next to a live row is an archive that has not finished.
        if archiving || !change.guard(post) {
            return Ok(Guarded::Rejected(post.clone()));
        }
        change.apply(post, now);
        let after = post.clone();

        tables.append(draft, change.audit_action(&after), now);
        Ok(Guarded::Applied(after))
    }

    async fn archive_post(
        &self,
        id: Uuid,
        archived_by: Uuid,
        at: DateTime<Utc>,
        draft: AuditDraft,
    ) -> StoreResult<ArchiveResult> {
        let mut tables = self.tables.lock().await;

        let Some(post) = tables.posts.get(&id).cloned() else {
            return Ok(ArchiveResult::Missing);
        };
        let Some(deleted_at) = post.deleted_at else {
            return Ok(ArchiveResult::NotSoftDeleted(post));
        };

        let existing = tables
            .tombstones
            .iter()
            .find(|t| t.original_id == id)
            .cloned();
        let snapshot = serde_json::to_value(&post)?;
        let tombstone = if let Some(existing) = existing {
            if existing.snapshot != snapshot {
                return Err(StoreError::Consistency(format!(
                    "tombstone {} for post {id} does not match the live row",
                    existing.id
                )));
            }
            tracing::warn!(
                post_id = %id,
                tombstone_id = %existing.id,
                "Resuming interrupted archive, reusing existing tombstone"
            );
            existing
        } else {
            let tombstone = ArchivedPost {
                id: Uuid::now_v7(),
                original_id: id,
                snapshot,
                deleted_at,
                deleted_by: post.deleted_by,
                archived_at: at,
                archived_by,
            };
            tables.tombstones.push(tombstone.clone());
            tombstone
        };

        if std::mem::take(&mut tables.interrupt_next_archive) {
            return Err(StoreError::Consistency(format!(
                "tombstone {} written but live post {id} was not removed",
                tombstone.id
            )));
        }

        if tables.posts.remove(&id).is_none() {
            return Err(StoreError::Consistency(format!(
                "live post {id} vanished during archive"
            )));
        }
        tables.append(draft, ActionType::Archive, at);

        Ok(ArchiveResult::Archived(tombstone))
    }

    async fn find_tombstone(&self, original_id: Uuid) -> StoreResult<Option<ArchivedPost>> {
        Ok(self
            .tables
            .lock()
            .await
            .tombstones
            .iter()
            .find(|t| t.original_id == original_id)
            .cloned())
    }

    async fn list_reported_posts(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>> {
        let tables = self.tables.lock().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.deleted_at.is_none() && p.reported_count > 0)
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.reported_count
                .cmp(&a.reported_count)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let tables = self.tables.lock().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by_key(|c| (c.parent_id.is_some(), c.parent_id, c.display_order, c.id));
        Ok(categories)
    }

    async fn list_siblings(&self, parent_id: Option<Uuid>) -> StoreResult<Vec<Category>> {
        let tables = self.tables.lock().await;
        let mut siblings: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.parent_id == parent_id)
            .cloned()
            .collect();
        siblings.sort_by_key(|c| (c.display_order, c.id));
        Ok(siblings)
    }

    async fn insert_category(&self, new: &NewCategory, draft: AuditDraft) -> StoreResult<Category> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if tables.categories.values().any(|c| c.slug == new.slug) {
            return Err(StoreError::DuplicateSlug(new.slug.clone()));
        }

        let display_order = tables
            .categories
            .values()
            .filter(|c| c.parent_id == new.parent_id)
            .map(|c| c.display_order)
            .max()
            .unwrap_or(0)
            + 1;

        let category = Category {
            id: new.id,
            parent_id: new.parent_id,
            slug: new.slug.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            display_order,
            is_active: true,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(category.id, category.clone());
        tables.append(draft, ActionType::CategoryCreate, now);

        Ok(category)
    }

    async fn swap_display_order(
        &self,
        moved: Uuid,
        displaced: Uuid,
        draft: AuditDraft,
    ) -> StoreResult<SwapResult> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let (Some(a), Some(b)) = (
            tables.categories.get(&moved).cloned(),
            tables.categories.get(&displaced).cloned(),
        ) else {
            return Ok(SwapResult::Missing);
        };
        if a.parent_id != b.parent_id {
            return Ok(SwapResult::NotSiblings);
        }

        let mut moved_row = a;
        let mut displaced_row = b;
        std::mem::swap(&mut moved_row.display_order, &mut displaced_row.display_order);
        moved_row.updated_at = now;
        displaced_row.updated_at = now;

        tables.categories.insert(moved_row.id, moved_row.clone());
        tables
            .categories
            .insert(displaced_row.id, displaced_row.clone());
        tables.append(draft, ActionType::CategoryMove, now);

        Ok(SwapResult::Swapped {
            moved: moved_row,
            displaced: displaced_row,
        })
    }

    async fn update_category(
        &self,
        id: Uuid,
        change: CategoryChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Category>> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let Some(category) = tables.categories.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if !change.guard(category) {
            return Ok(Guarded::Rejected(category.clone()));
        }
        change.apply(category, now);
        let after = category.clone();

        tables.append(draft, change.audit_action(), now);
        Ok(Guarded::Applied(after))
    }

    async fn list_moderation_log(&self, filter: &LogFilter) -> StoreResult<Vec<ModerationAction>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .log
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_moderation_log(&self, filter: &LogFilter) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.log.iter().filter(|e| filter.matches(e)).count() as i64)
    }

    async fn moderation_log_chain(&self) -> StoreResult<Vec<ModerationAction>> {
        Ok(self.tables.lock().await.log.clone())
    }
}
