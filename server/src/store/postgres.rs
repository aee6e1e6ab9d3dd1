//! `PostgreSQL` store.
//!
//! Each mutating method runs in one transaction. Post changes are guarded
//! single-statement updates; everything else locks the target rows
//! `FOR UPDATE` and re-checks the precondition against the locked copy. The
//! audit entry is appended before commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ArchiveResult, Guarded, ModerationStore, StoreError, StoreResult, SwapResult};
use crate::audit::{ActionType, AuditDraft, LogFilter, ModerationAction, GENESIS_HASH};
use crate::moderation::types::{
    ArchivedPost, Category, CategoryChange, ForumUser, NewCategory, Post, PostChange,
    StandingChange,
};

/// Advisory lock seed serializing moderation log appends (see `db` registry).
const LOG_APPEND_LOCK_SEED: i64 = 61;
/// Advisory lock seed serializing category inserts per sibling set.
const CATEGORY_INSERT_LOCK_SEED: i64 = 63;

const SLUG_CONSTRAINT: &str = "categories_slug_key";

const LOG_COLUMNS: &str = "id, moderator_id, action_type, target_type, target_id, reason, \
                           created_at, prev_hash, entry_hash";

#[derive(Debug, Clone)]
pub struct PgModerationStore {
    pool: PgPool,
}

impl PgModerationStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Seal `draft` onto the tail of the chain and insert it.
///
/// Must run inside the transaction that made the audited change.
async fn append_log(
    conn: &mut PgConnection,
    draft: AuditDraft,
    action: ActionType,
    at: DateTime<Utc>,
) -> StoreResult<ModerationAction> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('moderation_log', $1))")
        .bind(LOG_APPEND_LOCK_SEED)
        .execute(&mut *conn)
        .await?;

    let prev: Option<String> =
        sqlx::query_scalar("SELECT entry_hash FROM moderation_log ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    let entry = draft.seal(action, prev.as_deref().unwrap_or(GENESIS_HASH), at);

    sqlx::query(
        r"
        INSERT INTO moderation_log
            (id, moderator_id, action_type, target_type, target_id, reason, created_at,
             prev_hash, entry_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(entry.id)
    .bind(entry.moderator_id)
    .bind(entry.action_type)
    .bind(entry.target_type)
    .bind(entry.target_id)
    .bind(&entry.reason)
    .bind(entry.created_at)
    .bind(&entry.prev_hash)
    .bind(&entry.entry_hash)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

async fn write_user(conn: &mut PgConnection, user: &ForumUser) -> StoreResult<ForumUser> {
    let row = sqlx::query_as::<_, ForumUser>(
        r"
        UPDATE users
        SET is_forum_moderator = $2,
            is_banned = $3,
            is_read_only = $4,
            ban_reason = $5,
            banned_at = $6,
            banned_by = $7,
            updated_at = $8
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(user.id)
    .bind(user.is_forum_moderator)
    .bind(user.is_banned)
    .bind(user.is_read_only)
    .bind(&user.ban_reason)
    .bind(user.banned_at)
    .bind(user.banned_by)
    .bind(user.updated_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Guarded single-statement update for a post change.
///
/// Binds `$1 = id`, `$2 = now`, plus `$3 = at`, `$4 = by` for soft delete.
/// Every statement refuses a row that already has a tombstone, which only
/// happens while an archive is unfinished.
const fn post_change_sql(change: &PostChange) -> &'static str {
    match change {
        PostChange::ToggleHidden => {
            "UPDATE posts SET is_hidden = NOT is_hidden, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM archived_posts WHERE original_id = $1) \
             RETURNING *"
        }
        PostChange::ToggleLocalPin => {
            "UPDATE posts SET is_pinned = NOT is_pinned, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM archived_posts WHERE original_id = $1) \
             RETURNING *"
        }
        PostChange::ToggleGlobalPin => {
            "UPDATE posts SET global_pinned = NOT global_pinned, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM archived_posts WHERE original_id = $1) \
             RETURNING *"
        }
        PostChange::SoftDelete { .. } => {
            "UPDATE posts SET deleted_at = $3, deleted_by = $4, is_active = FALSE, \
             updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM archived_posts WHERE original_id = $1) \
             RETURNING *"
        }
        PostChange::Restore => {
            "UPDATE posts SET deleted_at = NULL, deleted_by = NULL, is_active = TRUE, \
             updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NOT NULL \
             AND NOT EXISTS (SELECT 1 FROM archived_posts WHERE original_id = $1) \
             RETURNING *"
        }
    }
}

async fn write_category(conn: &mut PgConnection, category: &Category) -> StoreResult<Category> {
    let row = sqlx::query_as::<_, Category>(
        r"
        UPDATE categories
        SET is_active = $2, is_archived = $3, updated_at = $4
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(category.id)
    .bind(category.is_active)
    .bind(category.is_archived)
    .bind(category.updated_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

fn push_log_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &LogFilter) {
    qb.push(" WHERE TRUE");
    if let Some(target_type) = filter.target_type {
        qb.push(" AND target_type = ").push_bind(target_type);
    }
    if let Some(target_id) = filter.target_id {
        qb.push(" AND target_id = ").push_bind(target_id);
    }
    if let Some(moderator_id) = filter.moderator_id {
        qb.push(" AND moderator_id = ").push_bind(moderator_id);
    }
    if let Some(action_type) = filter.action_type {
        qb.push(" AND action_type = ").push_bind(action_type);
    }
}

#[async_trait]
impl ModerationStore for PgModerationStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<ForumUser>> {
        let user = sqlx::query_as::<_, ForumUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, draft))]
    async fn update_standing(
        &self,
        id: Uuid,
        change: &StandingChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<ForumUser>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let Some(mut user) =
            sqlx::query_as::<_, ForumUser>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(Guarded::Missing);
        };
        if !change.guard(&user) {
            return Ok(Guarded::Rejected(user));
        }

        change.apply(&mut user, now);
        let after = write_user(&mut tx, &user).await?;
        append_log(&mut tx, draft, change.audit_action(&after), now).await?;

        tx.commit().await?;
        Ok(Guarded::Applied(after))
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    #[tracing::instrument(skip(self, draft))]
    async fn apply_post_change(
        &self,
        id: Uuid,
        change: PostChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Post>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let mut query = sqlx::query_as::<_, Post>(post_change_sql(&change))
            .bind(id)
            .bind(now);
        if let PostChange::SoftDelete { by, at } = change {
            query = query.bind(at).bind(by);
        }

        let Some(after) = query.fetch_optional(&mut *tx).await? else {
            let current = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            return Ok(current.map_or(Guarded::Missing, Guarded::Rejected));
        };
        append_log(&mut tx, draft, change.audit_action(&after), now).await?;

        tx.commit().await?;
        Ok(Guarded::Applied(after))
    }

    #[tracing::instrument(skip(self, draft))]
    async fn archive_post(
        &self,
        id: Uuid,
        archived_by: Uuid,
        at: DateTime<Utc>,
        draft: AuditDraft,
    ) -> StoreResult<ArchiveResult> {
        let mut tx = self.pool.begin().await?;

        let Some(post) = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(ArchiveResult::Missing);
        };
        let Some(deleted_at) = post.deleted_at else {
            return Ok(ArchiveResult::NotSoftDeleted(post));
        };

        let existing = sqlx::query_as::<_, ArchivedPost>(
            "SELECT * FROM archived_posts WHERE original_id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

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
            sqlx::query_as::<_, ArchivedPost>(
                r"
                INSERT INTO archived_posts
                    (id, original_id, snapshot, deleted_at, deleted_by, archived_at, archived_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                ",
            )
            .bind(Uuid::now_v7())
            .bind(id)
            .bind(snapshot)
            .bind(deleted_at)
            .bind(post.deleted_by)
            .bind(at)
            .bind(archived_by)
            .fetch_one(&mut *tx)
            .await?
        };

        let removed = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed != 1 {
            // Dropping the transaction rolls back the tombstone insert.
            return Err(StoreError::Consistency(format!(
                "archive of post {id} removed {removed} live rows"
            )));
        }

        append_log(&mut tx, draft, ActionType::Archive, at).await?;

        tx.commit().await?;
        Ok(ArchiveResult::Archived(tombstone))
    }

    async fn find_tombstone(&self, original_id: Uuid) -> StoreResult<Option<ArchivedPost>> {
        let tombstone = sqlx::query_as::<_, ArchivedPost>(
            "SELECT * FROM archived_posts WHERE original_id = $1",
        )
        .bind(original_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tombstone)
    }

    async fn list_reported_posts(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r"
            SELECT * FROM posts
            WHERE deleted_at IS NULL AND reported_count > 0
            ORDER BY reported_count DESC, created_at DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT * FROM categories
            ORDER BY parent_id IS NOT NULL, parent_id, display_order, id
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn list_siblings(&self, parent_id: Option<Uuid>) -> StoreResult<Vec<Category>> {
        let siblings = sqlx::query_as::<_, Category>(
            r"
            SELECT * FROM categories
            WHERE parent_id IS NOT DISTINCT FROM $1
            ORDER BY display_order, id
            ",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(siblings)
    }

    #[tracing::instrument(skip(self, draft))]
    async fn insert_category(&self, new: &NewCategory, draft: AuditDraft) -> StoreResult<Category> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(COALESCE($1::text, 'root'), $2))",
        )
        .bind(new.parent_id)
        .bind(CATEGORY_INSERT_LOCK_SEED)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO categories
                (id, parent_id, slug, name, description, display_order, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, COALESCE(MAX(display_order), 0) + 1, $6, $6
            FROM categories
            WHERE parent_id IS NOT DISTINCT FROM $2
            RETURNING *
            ",
        )
        .bind(new.id)
        .bind(new.parent_id)
        .bind(&new.slug)
        .bind(&new.name)
        .bind(&new.description)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let category = match inserted {
            Ok(category) => category,
            Err(sqlx::Error::Database(ref db_err))
                if db_err.is_unique_violation() && db_err.constraint() == Some(SLUG_CONSTRAINT) =>
            {
                return Err(StoreError::DuplicateSlug(new.slug.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        append_log(&mut tx, draft, ActionType::CategoryCreate, now).await?;

        tx.commit().await?;
        Ok(category)
    }

    #[tracing::instrument(skip(self, draft))]
    async fn swap_display_order(
        &self,
        moved: Uuid,
        displaced: Uuid,
        draft: AuditDraft,
    ) -> StoreResult<SwapResult> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let rows = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(vec![moved, displaced])
        .fetch_all(&mut *tx)
        .await?;

        let (Some(a), Some(b)) = (
            rows.iter().find(|c| c.id == moved),
            rows.iter().find(|c| c.id == displaced),
        ) else {
            return Ok(SwapResult::Missing);
        };
        if a.parent_id != b.parent_id {
            return Ok(SwapResult::NotSiblings);
        }

        // The sibling-order constraint is deferred, so the transient
        // duplicate inside this single statement is allowed.
        let swapped = sqlx::query_as::<_, Category>(
            r"
            UPDATE categories
            SET display_order = CASE WHEN id = $1 THEN $4 ELSE $3 END,
                updated_at = $5
            WHERE id IN ($1, $2)
            RETURNING *
            ",
        )
        .bind(moved)
        .bind(displaced)
        .bind(a.display_order)
        .bind(b.display_order)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let (Some(moved_row), Some(displaced_row)) = (
            swapped.iter().find(|c| c.id == moved).cloned(),
            swapped.iter().find(|c| c.id == displaced).cloned(),
        ) else {
            return Err(StoreError::Consistency(format!(
                "swap of categories {moved} and {displaced} updated {} rows",
                swapped.len()
            )));
        };

        append_log(&mut tx, draft, ActionType::CategoryMove, now).await?;

        tx.commit().await?;
        Ok(SwapResult::Swapped {
            moved: moved_row,
            displaced: displaced_row,
        })
    }

    #[tracing::instrument(skip(self, draft))]
    async fn update_category(
        &self,
        id: Uuid,
        change: CategoryChange,
        draft: AuditDraft,
    ) -> StoreResult<Guarded<Category>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let Some(mut category) =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(Guarded::Missing);
        };
        if !change.guard(&category) {
            return Ok(Guarded::Rejected(category));
        }

        change.apply(&mut category, now);
        let after = write_category(&mut tx, &category).await?;
        append_log(&mut tx, draft, change.audit_action(), now).await?;

        tx.commit().await?;
        Ok(Guarded::Applied(after))
    }

    async fn list_moderation_log(&self, filter: &LogFilter) -> StoreResult<Vec<ModerationAction>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {LOG_COLUMNS} FROM moderation_log"));
        push_log_filter(&mut qb, filter);
        qb.push(" ORDER BY seq DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let entries = qb
            .build_query_as::<ModerationAction>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn count_moderation_log(&self, filter: &LogFilter) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM moderation_log");
        push_log_filter(&mut qb, filter);

        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn moderation_log_chain(&self) -> StoreResult<Vec<ModerationAction>> {
        let entries = sqlx::query_as::<_, ModerationAction>(&format!(
            "SELECT {LOG_COLUMNS} FROM moderation_log ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
