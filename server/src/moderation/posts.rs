//! Post Lifecycle Engine.
//!
//! `active -> soft-deleted -> archived`, with hide and pin flags orthogonal
//! to the lifecycle. Flag toggles and soft delete only apply to active posts.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::error::ModerationError;
use super::types::{ArchivedPost, Outcome, Post, PostChange, PostView};
use crate::audit::AuditDraft;
use crate::permissions::{Actor, RoleTier};
use crate::store::{ArchiveResult, Guarded, ModerationStore};

const MAX_QUEUE_PAGE: i64 = 100;

async fn transition(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
    change: PostChange,
    required: RoleTier,
    reason: Option<String>,
) -> Result<Outcome<Post>, ModerationError> {
    actor.require(required)?;

    let draft = AuditDraft::new(actor.id, post_id).with_reason(reason);
    match store.apply_post_change(post_id, change, draft).await? {
        Guarded::Applied(post) => {
            info!(
                actor_id = %actor.id,
                post_id = %post_id,
                change = ?change,
                "Post transition applied"
            );
            Ok(Outcome::Changed(post))
        }
        Guarded::Missing => Err(missing_post(store, post_id).await),
        Guarded::Rejected(_) => Err(rejected_post(store, post_id, change).await),
    }
}

/// Error for a live row the change guard refused. A tombstone beside a live
/// row means an archive stopped halfway and must be retried first.
async fn rejected_post(
    store: &dyn ModerationStore,
    post_id: Uuid,
    change: PostChange,
) -> ModerationError {
    match store.find_tombstone(post_id).await {
        Ok(Some(_)) => ModerationError::Precondition(
            "Post archive is in progress; retry the archive".to_string(),
        ),
        Ok(None) if change.requires_deleted() => {
            ModerationError::Precondition("Post is not soft-deleted".to_string())
        }
        Ok(None) => ModerationError::Precondition("Post is soft-deleted".to_string()),
        Err(e) => e.into(),
    }
}

/// Error for a post id with no live row: archived posts are a precondition
/// failure, unknown ids are not found.
async fn missing_post(store: &dyn ModerationStore, post_id: Uuid) -> ModerationError {
    match store.find_tombstone(post_id).await {
        Ok(Some(_)) => ModerationError::Precondition("Post has been archived".to_string()),
        Ok(None) => ModerationError::NotFound("Post"),
        Err(e) => e.into(),
    }
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn toggle_hidden(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<Outcome<Post>, ModerationError> {
    transition(store, actor, post_id, PostChange::ToggleHidden, RoleTier::Moderator, None).await
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn toggle_local_pin(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<Outcome<Post>, ModerationError> {
    transition(store, actor, post_id, PostChange::ToggleLocalPin, RoleTier::Moderator, None).await
}

/// Global pins are visible forum-wide, so they need a forum admin.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn toggle_global_pin(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<Outcome<Post>, ModerationError> {
    transition(store, actor, post_id, PostChange::ToggleGlobalPin, RoleTier::ForumAdmin, None).await
}

/// Reversible removal. A blank reason is recorded as no reason.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn soft_delete(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
    reason: Option<String>,
) -> Result<Outcome<Post>, ModerationError> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let change = PostChange::SoftDelete {
        by: actor.id,
        at: Utc::now(),
    };
    transition(store, actor, post_id, change, RoleTier::ForumAdmin, reason).await
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn restore(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<Outcome<Post>, ModerationError> {
    transition(store, actor, post_id, PostChange::Restore, RoleTier::ForumAdmin, None).await
}

/// Move a soft-deleted post into the tombstone table.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn archive(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<Outcome<ArchivedPost>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let draft = AuditDraft::new(actor.id, post_id);
    match store
        .archive_post(post_id, actor.id, Utc::now(), draft)
        .await?
    {
        ArchiveResult::Archived(tombstone) => {
            info!(
                actor_id = %actor.id,
                post_id = %post_id,
                tombstone_id = %tombstone.id,
                "Post archived"
            );
            Ok(Outcome::Changed(tombstone))
        }
        ArchiveResult::Missing => Err(missing_post(store, post_id).await),
        ArchiveResult::NotSoftDeleted(_) => Err(ModerationError::Precondition(
            "Post must be soft-deleted before it can be archived".to_string(),
        )),
    }
}

/// Read a live post as `actor` may see it.
///
/// Soft-deleted payloads are withheld below forum admin and hidden payloads
/// below moderator.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn view_post(
    store: &dyn ModerationStore,
    actor: &Actor,
    post_id: Uuid,
) -> Result<PostView, ModerationError> {
    let post = store
        .find_post(post_id)
        .await?
        .ok_or(ModerationError::NotFound("Post"))?;

    if let Some(deleted_at) = post.deleted_at {
        if !actor.has_tier(RoleTier::ForumAdmin) {
            return Ok(PostView::Removed {
                id: post.id,
                deleted_at,
            });
        }
    }
    if post.is_hidden && !actor.has_tier(RoleTier::Moderator) {
        return Ok(PostView::Hidden { id: post.id });
    }

    Ok(PostView::Full { post })
}

/// Active posts with open reports, most reported first.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn moderation_queue(
    store: &dyn ModerationStore,
    actor: &Actor,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, ModerationError> {
    actor.require(RoleTier::Moderator)?;

    let posts = store
        .list_reported_posts(limit.clamp(1, MAX_QUEUE_PAGE), offset.max(0))
        .await?;
    Ok(posts)
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn get_tombstone(
    store: &dyn ModerationStore,
    actor: &Actor,
    original_id: Uuid,
) -> Result<ArchivedPost, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    store
        .find_tombstone(original_id)
        .await?
        .ok_or(ModerationError::NotFound("Archived post"))
}
