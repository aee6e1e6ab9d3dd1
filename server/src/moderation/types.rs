//! Moderation Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::audit::ActionType;
use crate::permissions::{resolve_tier, Actor, RoleFlags, RoleTier};

// ============================================================================
// Records
// ============================================================================

/// A live forum post.
///
/// `deleted_at.is_some()` always coincides with `!is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub is_hidden: bool,
    /// Pinned within its own category.
    pub is_pinned: bool,
    /// Pinned across the whole forum; dominates the local pin when rendering.
    pub global_pinned: bool,
    pub reported_count: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    #[must_use]
    pub const fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the deletion marker and the active flag agree.
    #[must_use]
    pub const fn deletion_state_consistent(&self) -> bool {
        self.deleted_at.is_some() != self.is_active
    }
}

/// Tombstone written when a soft-deleted post leaves the live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArchivedPost {
    pub id: Uuid,
    pub original_id: Uuid,
    /// Verbatim copy of the live row at the time of archival.
    pub snapshot: serde_json::Value,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: Option<Uuid>,
    pub archived_at: DateTime<Utc>,
    pub archived_by: Uuid,
}

impl ArchivedPost {
    /// Decode the snapshot back into the post it was taken from.
    pub fn original(&self) -> serde_json::Result<Post> {
        serde_json::from_value(self.snapshot.clone())
    }
}

/// A post as seen through the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostView {
    /// Full payload.
    Full { post: Post },
    /// Soft-deleted; payload withheld below forum admin.
    Removed {
        id: Uuid,
        deleted_at: DateTime<Utc>,
    },
    /// Hidden; payload withheld below moderator.
    Hidden { id: Uuid },
}

/// Forum user record with role and sanction flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForumUser {
    pub id: Uuid,
    pub username: String,
    pub is_super_admin: bool,
    pub is_forum_admin: bool,
    pub is_forum_moderator: bool,
    pub is_banned: bool,
    pub is_read_only: bool,
    pub ban_reason: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
    pub banned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ForumUser {
    #[must_use]
    pub const fn role_flags(&self) -> RoleFlags {
        RoleFlags {
            is_super_admin: self.is_super_admin,
            is_forum_admin: self.is_forum_admin,
            is_forum_moderator: self.is_forum_moderator,
        }
    }

    #[must_use]
    pub const fn tier(&self) -> RoleTier {
        resolve_tier(&self.role_flags())
    }
}

impl From<&ForumUser> for Actor {
    fn from(user: &ForumUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            tier: user.tier(),
            is_banned: user.is_banned,
            is_read_only: user.is_read_only,
        }
    }
}

/// Forum category; at most two levels deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// Rank within the sibling set sharing `parent_id`.
    pub display_order: i32,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category about to be inserted; the store assigns `display_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

// ============================================================================
// Changes applied by the store
// ============================================================================

/// State change on a live post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostChange {
    ToggleHidden,
    ToggleLocalPin,
    ToggleGlobalPin,
    SoftDelete { by: Uuid, at: DateTime<Utc> },
    Restore,
}

impl PostChange {
    /// Whether the change applies to a soft-deleted post (otherwise to an active one).
    #[must_use]
    pub const fn requires_deleted(&self) -> bool {
        matches!(self, Self::Restore)
    }

    /// Source-state precondition, re-checked by the store under lock.
    #[must_use]
    pub const fn guard(&self, post: &Post) -> bool {
        post.is_soft_deleted() == self.requires_deleted()
    }

    /// Apply the change to an in-memory copy.
    pub fn apply(&self, post: &mut Post, now: DateTime<Utc>) {
        match *self {
            Self::ToggleHidden => post.is_hidden = !post.is_hidden,
            Self::ToggleLocalPin => post.is_pinned = !post.is_pinned,
            Self::ToggleGlobalPin => post.global_pinned = !post.global_pinned,
            Self::SoftDelete { by, at } => {
                post.deleted_at = Some(at);
                post.deleted_by = Some(by);
                post.is_active = false;
            }
            Self::Restore => {
                post.deleted_at = None;
                post.deleted_by = None;
                post.is_active = true;
            }
        }
        post.updated_at = now;
    }

    /// Audit action for the state the change produced.
    #[must_use]
    pub const fn audit_action(&self, after: &Post) -> ActionType {
        match self {
            Self::ToggleHidden if after.is_hidden => ActionType::Hide,
            Self::ToggleHidden => ActionType::Unhide,
            Self::ToggleLocalPin if after.is_pinned => ActionType::Pin,
            Self::ToggleLocalPin => ActionType::Unpin,
            Self::ToggleGlobalPin if after.global_pinned => ActionType::GlobalPin,
            Self::ToggleGlobalPin => ActionType::GlobalUnpin,
            Self::SoftDelete { .. } => ActionType::SoftDelete,
            Self::Restore => ActionType::Restore,
        }
    }
}

/// State change on a category's activation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryChange {
    Archive,
    SetActive(bool),
}

impl CategoryChange {
    #[must_use]
    pub const fn guard(&self, category: &Category) -> bool {
        match *self {
            Self::Archive => !category.is_archived,
            Self::SetActive(active) => {
                category.is_active != active && !(active && category.is_archived)
            }
        }
    }

    pub fn apply(&self, category: &mut Category, now: DateTime<Utc>) {
        match *self {
            Self::Archive => {
                category.is_archived = true;
                category.is_active = false;
            }
            Self::SetActive(active) => category.is_active = active,
        }
        category.updated_at = now;
    }

    #[must_use]
    pub const fn audit_action(&self) -> ActionType {
        match self {
            Self::Archive => ActionType::CategoryArchive,
            Self::SetActive(true) => ActionType::CategoryActivate,
            Self::SetActive(false) => ActionType::CategoryDeactivate,
        }
    }
}

/// Change to a user's standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandingChange {
    Ban {
        reason: String,
        by: Uuid,
        at: DateTime<Utc>,
    },
    Unban,
    ToggleReadOnly,
    SetModerator(bool),
}

impl StandingChange {
    /// Super admins are never touched; forum admins keep their moderator flag.
    #[must_use]
    pub const fn guard(&self, user: &ForumUser) -> bool {
        if user.is_super_admin {
            return false;
        }
        match self {
            Self::Ban { .. } => !user.is_banned,
            Self::Unban => user.is_banned,
            Self::ToggleReadOnly => true,
            Self::SetModerator(value) => !user.is_forum_admin && user.is_forum_moderator != *value,
        }
    }

    pub fn apply(&self, user: &mut ForumUser, now: DateTime<Utc>) {
        match self {
            Self::Ban { reason, by, at } => {
                user.is_banned = true;
                user.ban_reason = Some(reason.clone());
                user.banned_at = Some(*at);
                user.banned_by = Some(*by);
            }
            Self::Unban => {
                user.is_banned = false;
                user.ban_reason = None;
                user.banned_at = None;
                user.banned_by = None;
            }
            Self::ToggleReadOnly => user.is_read_only = !user.is_read_only,
            Self::SetModerator(value) => user.is_forum_moderator = *value,
        }
        user.updated_at = now;
    }

    #[must_use]
    pub const fn audit_action(&self, after: &ForumUser) -> ActionType {
        match self {
            Self::Ban { .. } => ActionType::Ban,
            Self::Unban => ActionType::Unban,
            Self::ToggleReadOnly if after.is_read_only => ActionType::ReadOnlyOn,
            Self::ToggleReadOnly => ActionType::ReadOnlyOff,
            Self::SetModerator(true) => ActionType::GrantModerator,
            Self::SetModerator(false) => ActionType::RevokeModerator,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a transition request.
///
/// `Unchanged` means the request was a valid no-op and nothing was audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Changed(T),
    Unchanged(T),
}

impl<T> Outcome<T> {
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Changed(value) | Self::Unchanged(value) => value,
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SoftDeleteRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: String,
    #[validate(regex(
        path = *CATEGORY_SLUG,
        message = "Slug must be lowercase letters, digits and hyphens (max 64)"
    ))]
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

pub static CATEGORY_SLUG: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
pub struct MoveCategoryRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default = "default_queue_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

const fn default_queue_limit() -> i64 {
    20
}

// ============================================================================
// Response Types
// ============================================================================

/// Body returned by every transition endpoint.
#[derive(Debug, Serialize)]
pub struct TransitionResponse<T> {
    pub changed: bool,
    pub item: T,
}

impl<T> From<Outcome<T>> for TransitionResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            changed: outcome.is_changed(),
            item: outcome.into_inner(),
        }
    }
}
