//! Moderation log types.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chain::compute_entry_hash;

// ============================================================================
// Database Enums
// ============================================================================

/// Kind of completed moderation transition.
///
/// Toggle transitions are tagged by the state they produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "moderation_action_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Hide,
    Unhide,
    Pin,
    Unpin,
    GlobalPin,
    GlobalUnpin,
    SoftDelete,
    Restore,
    Archive,
    CategoryCreate,
    CategoryMove,
    CategoryArchive,
    CategoryActivate,
    CategoryDeactivate,
    Ban,
    Unban,
    ReadOnlyOn,
    ReadOnlyOff,
    GrantModerator,
    RevokeModerator,
}

impl ActionType {
    /// Stored and serialized name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Unhide => "unhide",
            Self::Pin => "pin",
            Self::Unpin => "unpin",
            Self::GlobalPin => "global_pin",
            Self::GlobalUnpin => "global_unpin",
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
            Self::Archive => "archive",
            Self::CategoryCreate => "category_create",
            Self::CategoryMove => "category_move",
            Self::CategoryArchive => "category_archive",
            Self::CategoryActivate => "category_activate",
            Self::CategoryDeactivate => "category_deactivate",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::ReadOnlyOn => "read_only_on",
            Self::ReadOnlyOff => "read_only_off",
            Self::GrantModerator => "grant_moderator",
            Self::RevokeModerator => "revoke_moderator",
        }
    }

    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Hide,
            Self::Unhide,
            Self::Pin,
            Self::Unpin,
            Self::GlobalPin,
            Self::GlobalUnpin,
            Self::SoftDelete,
            Self::Restore,
            Self::Archive,
            Self::CategoryCreate,
            Self::CategoryMove,
            Self::CategoryArchive,
            Self::CategoryActivate,
            Self::CategoryDeactivate,
            Self::Ban,
            Self::Unban,
            Self::ReadOnlyOn,
            Self::ReadOnlyOff,
            Self::GrantModerator,
            Self::RevokeModerator,
        ]
    }

    /// The kind of record this action applies to.
    #[must_use]
    pub const fn target_type(&self) -> TargetType {
        match self {
            Self::Hide
            | Self::Unhide
            | Self::Pin
            | Self::Unpin
            | Self::GlobalPin
            | Self::GlobalUnpin
            | Self::SoftDelete
            | Self::Restore
            | Self::Archive => TargetType::Post,
            Self::CategoryCreate
            | Self::CategoryMove
            | Self::CategoryArchive
            | Self::CategoryActivate
            | Self::CategoryDeactivate => TargetType::Category,
            Self::Ban
            | Self::Unban
            | Self::ReadOnlyOn
            | Self::ReadOnlyOff
            | Self::GrantModerator
            | Self::RevokeModerator => TargetType::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "moderation_target_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Post,
    Category,
    User,
}

impl TargetType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Category => "category",
            Self::User => "user",
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One immutable moderation log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModerationAction {
    pub id: Uuid,
    pub moderator_id: Uuid,
    pub action_type: ActionType,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Hash of the preceding entry (genesis hash for the first one).
    pub prev_hash: String,
    /// SHA-256 over `prev_hash` and this entry's fields.
    pub entry_hash: String,
}

/// Who acted on what, before the entry is sealed into the chain.
///
/// The action type is attached by the store once the resulting state is
/// known, so toggles are always tagged with the state actually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub moderator_id: Uuid,
    pub target_id: Uuid,
    pub reason: Option<String>,
}

impl AuditDraft {
    #[must_use]
    pub const fn new(moderator_id: Uuid, target_id: Uuid) -> Self {
        Self {
            moderator_id,
            target_id,
            reason: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Seal the draft into a chained entry following `prev_hash`.
    ///
    /// The timestamp is truncated to microseconds, the precision Postgres
    /// stores, so the hash can be recomputed from a persisted row.
    #[must_use]
    pub fn seal(
        self,
        action_type: ActionType,
        prev_hash: &str,
        at: DateTime<Utc>,
    ) -> ModerationAction {
        let created_at = at.trunc_subsecs(6);
        let id = Uuid::now_v7();
        let target_type = action_type.target_type();
        let entry_hash = compute_entry_hash(
            prev_hash,
            id,
            self.moderator_id,
            action_type,
            target_type,
            self.target_id,
            self.reason.as_deref(),
            created_at,
        );

        ModerationAction {
            id,
            moderator_id: self.moderator_id,
            action_type,
            target_type,
            target_id: self.target_id,
            reason: self.reason,
            created_at,
            prev_hash: prev_hash.to_string(),
            entry_hash,
        }
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Filter for listing the moderation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub target_type: Option<TargetType>,
    pub target_id: Option<Uuid>,
    pub moderator_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub limit: i64,
    pub offset: i64,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            target_type: None,
            target_id: None,
            moderator_id: None,
            action_type: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl LogFilter {
    /// Clamp pagination to sane bounds.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self.offset = self.offset.max(0);
        self
    }

    /// Whether `entry` passes every set criterion.
    #[must_use]
    pub fn matches(&self, entry: &ModerationAction) -> bool {
        self.target_type.is_none_or(|t| t == entry.target_type)
            && self.target_id.is_none_or(|id| id == entry.target_id)
            && self.moderator_id.is_none_or(|id| id == entry.moderator_id)
            && self.action_type.is_none_or(|a| a == entry.action_type)
    }
}
