//! User Sanction Engine.
//!
//! Super admins are immune to everything here. Forum admins are additionally
//! immune to moderator grant/revoke.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::error::ModerationError;
use super::types::{ForumUser, Outcome, StandingChange};
use crate::audit::AuditDraft;
use crate::permissions::{Actor, AuthorizationError, RoleTier};
use crate::store::{Guarded, ModerationStore};

const SUPER_ADMIN_IMMUNE: &str = "super admins cannot be sanctioned";
const FORUM_ADMIN_IMMUNE: &str = "forum admin roles are managed outside moderation";

async fn apply(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
    change: &StandingChange,
    reason: Option<String>,
) -> Result<Outcome<ForumUser>, ModerationError> {
    let draft = AuditDraft::new(actor.id, user_id).with_reason(reason);
    match store.update_standing(user_id, change, draft).await? {
        Guarded::Applied(user) => {
            info!(
                actor_id = %actor.id,
                user_id = %user_id,
                action = change.audit_action(&user).as_str(),
                "User standing changed"
            );
            Ok(Outcome::Changed(user))
        }
        Guarded::Rejected(user) if user.is_super_admin => {
            Err(AuthorizationError::ProtectedTarget(SUPER_ADMIN_IMMUNE).into())
        }
        Guarded::Rejected(user)
            if user.is_forum_admin && matches!(change, StandingChange::SetModerator(_)) =>
        {
            Err(AuthorizationError::ProtectedTarget(FORUM_ADMIN_IMMUNE).into())
        }
        Guarded::Rejected(user) => Ok(Outcome::Unchanged(user)),
        Guarded::Missing => Err(ModerationError::NotFound("User")),
    }
}

/// Ban a user. The reason is mandatory.
#[tracing::instrument(skip(store, actor, reason), fields(actor_id = %actor.id))]
pub async fn ban(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
    reason: &str,
) -> Result<Outcome<ForumUser>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ModerationError::Validation(
            "A reason is required to ban a user".to_string(),
        ));
    }
    if user_id == actor.id {
        return Err(ModerationError::Validation("Cannot ban yourself".to_string()));
    }

    let change = StandingChange::Ban {
        reason: reason.to_string(),
        by: actor.id,
        at: Utc::now(),
    };
    apply(store, actor, user_id, &change, Some(reason.to_string())).await
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn unban(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
) -> Result<Outcome<ForumUser>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;
    apply(store, actor, user_id, &StandingChange::Unban, None).await
}

/// Flip the read-only flag. Enforcement belongs to the post-authoring flow.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn toggle_read_only(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
) -> Result<Outcome<ForumUser>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;
    apply(store, actor, user_id, &StandingChange::ToggleReadOnly, None).await
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn grant_moderator(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
) -> Result<Outcome<ForumUser>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;
    apply(store, actor, user_id, &StandingChange::SetModerator(true), None).await
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn revoke_moderator(
    store: &dyn ModerationStore,
    actor: &Actor,
    user_id: Uuid,
) -> Result<Outcome<ForumUser>, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;
    apply(store, actor, user_id, &StandingChange::SetModerator(false), None).await
}
