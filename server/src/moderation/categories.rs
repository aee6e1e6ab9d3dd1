//! Category Tree Ordering Engine.
//!
//! Sibling order is maintained by exchanging the `display_order` values of
//! two adjacent siblings, never by renumbering. New categories append at
//! `max + 1`. The tree is at most two levels deep.

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::error::ModerationError;
use super::types::{
    Category, CategoryChange, CreateCategoryRequest, MoveDirection, NewCategory, Outcome,
};
use crate::audit::AuditDraft;
use crate::permissions::{Actor, RoleTier};
use crate::store::{Guarded, ModerationStore, SwapResult};

/// The sibling `category_id` would swap with, or `None` at a boundary.
///
/// `siblings` must be sorted by `display_order`.
#[must_use]
pub fn swap_partner(
    siblings: &[Category],
    category_id: Uuid,
    direction: MoveDirection,
) -> Option<Uuid> {
    let rank = siblings.iter().position(|c| c.id == category_id)?;
    let neighbour = match direction {
        MoveDirection::Up => rank.checked_sub(1)?,
        MoveDirection::Down => rank + 1,
    };
    siblings.get(neighbour).map(|c| c.id)
}

/// Every category for forum admins; only active ones for everyone else.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn list_categories(
    store: &dyn ModerationStore,
    actor: &Actor,
) -> Result<Vec<Category>, ModerationError> {
    let mut categories = store.list_categories().await?;
    if !actor.has_tier(RoleTier::ForumAdmin) {
        categories.retain(|c| c.is_active);
    }
    Ok(categories)
}

#[tracing::instrument(
    skip(store, actor, request),
    fields(actor_id = %actor.id, slug = %request.slug)
)]
pub async fn create_category(
    store: &dyn ModerationStore,
    actor: &Actor,
    request: CreateCategoryRequest,
) -> Result<Outcome<Category>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    request
        .validate()
        .map_err(|e| ModerationError::Validation(e.to_string()))?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ModerationError::Validation(
            "Name must not be blank".to_string(),
        ));
    }

    if let Some(parent_id) = request.parent_id {
        let parent = store
            .find_category(parent_id)
            .await?
            .ok_or(ModerationError::NotFound("Parent category"))?;
        if parent.parent_id.is_some() {
            return Err(ModerationError::Validation(
                "Cannot nest more than 2 levels".to_string(),
            ));
        }
        if parent.is_archived {
            return Err(ModerationError::Precondition(
                "Parent category is archived".to_string(),
            ));
        }
    }

    let new = NewCategory {
        id: Uuid::now_v7(),
        parent_id: request.parent_id,
        slug: request.slug,
        name: name.to_string(),
        description: request.description,
    };
    let draft = AuditDraft::new(actor.id, new.id);
    let category = store.insert_category(&new, draft).await?;

    info!(
        actor_id = %actor.id,
        category_id = %category.id,
        display_order = category.display_order,
        "Category created"
    );
    Ok(Outcome::Changed(category))
}

/// Swap a category with its neighbour. A move past either end of the
/// sibling set is a no-op.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn move_category(
    store: &dyn ModerationStore,
    actor: &Actor,
    category_id: Uuid,
    direction: MoveDirection,
) -> Result<Outcome<Category>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let category = store
        .find_category(category_id)
        .await?
        .ok_or(ModerationError::NotFound("Category"))?;
    let siblings = store.list_siblings(category.parent_id).await?;

    let Some(partner) = swap_partner(&siblings, category_id, direction) else {
        return Ok(Outcome::Unchanged(category));
    };

    let draft = AuditDraft::new(actor.id, category_id);
    match store
        .swap_display_order(category_id, partner, draft)
        .await?
    {
        SwapResult::Swapped { moved, displaced } => {
            info!(
                actor_id = %actor.id,
                category_id = %moved.id,
                displaced_id = %displaced.id,
                display_order = moved.display_order,
                "Category moved"
            );
            Ok(Outcome::Changed(moved))
        }
        SwapResult::Missing => Err(ModerationError::NotFound("Category")),
        SwapResult::NotSiblings => Err(ModerationError::Precondition(
            "Category is no longer in the same sibling set".to_string(),
        )),
    }
}

/// Archive without touching `display_order` or any child category.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn archive_category(
    store: &dyn ModerationStore,
    actor: &Actor,
    category_id: Uuid,
) -> Result<Outcome<Category>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let draft = AuditDraft::new(actor.id, category_id);
    match store
        .update_category(category_id, CategoryChange::Archive, draft)
        .await?
    {
        Guarded::Applied(category) => {
            info!(actor_id = %actor.id, category_id = %category_id, "Category archived");
            Ok(Outcome::Changed(category))
        }
        Guarded::Rejected(category) => Ok(Outcome::Unchanged(category)),
        Guarded::Missing => Err(ModerationError::NotFound("Category")),
    }
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn set_category_active(
    store: &dyn ModerationStore,
    actor: &Actor,
    category_id: Uuid,
    is_active: bool,
) -> Result<Outcome<Category>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let draft = AuditDraft::new(actor.id, category_id);
    match store
        .update_category(category_id, CategoryChange::SetActive(is_active), draft)
        .await?
    {
        Guarded::Applied(category) => {
            info!(
                actor_id = %actor.id,
                category_id = %category_id,
                is_active,
                "Category activation changed"
            );
            Ok(Outcome::Changed(category))
        }
        Guarded::Rejected(category) if is_active && category.is_archived => Err(
            ModerationError::Precondition("Archived categories cannot be reactivated".to_string()),
        ),
        Guarded::Rejected(category) => Ok(Outcome::Unchanged(category)),
        Guarded::Missing => Err(ModerationError::NotFound("Category")),
    }
}
