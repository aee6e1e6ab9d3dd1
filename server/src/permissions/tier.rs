//! Role tiers and the per-request actor snapshot.
//!
//! The tier is computed once from the user record's role flags and carried on
//! [`Actor`]; every authorization decision compares tiers through
//! [`Actor::require`] instead of re-reading raw flags at the call site.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Effective authorization level, strictly ordered.
///
/// `ForumAdmin` and `SuperAdmin` carry every `Moderator` capability, and
/// `SuperAdmin` carries every `ForumAdmin` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    None,
    Moderator,
    ForumAdmin,
    SuperAdmin,
}

impl RoleTier {
    /// Name used in error payloads and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Moderator => "moderator",
            Self::ForumAdmin => "forum_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Returns all tiers in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::None, Self::Moderator, Self::ForumAdmin, Self::SuperAdmin]
    }
}

impl std::fmt::Display for RoleTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw role flags as stored on the user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleFlags {
    pub is_super_admin: bool,
    pub is_forum_admin: bool,
    pub is_forum_moderator: bool,
}

/// Resolve the effective tier from role flags.
///
/// The highest held flag wins; an actor holding no flag resolves to
/// [`RoleTier::None`].
#[must_use]
pub const fn resolve_tier(flags: &RoleFlags) -> RoleTier {
    if flags.is_super_admin {
        RoleTier::SuperAdmin
    } else if flags.is_forum_admin {
        RoleTier::ForumAdmin
    } else if flags.is_forum_moderator {
        RoleTier::Moderator
    } else {
        RoleTier::None
    }
}

/// Authorization failures. Never accompanied by a state change or audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The actor's tier is below what the operation demands.
    #[error("requires {required} tier (actor has {actual})")]
    InsufficientTier { required: RoleTier, actual: RoleTier },

    /// Banned actors cannot perform moderation actions.
    #[error("banned users cannot perform moderation actions")]
    ActorBanned,

    /// The target is outside this subsystem's authority.
    #[error("target is protected: {0}")]
    ProtectedTarget(&'static str),
}

/// Authenticated caller, snapshotted once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub tier: RoleTier,
    pub is_banned: bool,
    pub is_read_only: bool,
}

impl Actor {
    /// Check that the actor may perform an action requiring `required`.
    pub const fn require(&self, required: RoleTier) -> Result<(), AuthorizationError> {
        if self.is_banned {
            return Err(AuthorizationError::ActorBanned);
        }
        // Enum discriminants follow declaration order.
        if (self.tier as u8) < (required as u8) {
            return Err(AuthorizationError::InsufficientTier {
                required,
                actual: self.tier,
            });
        }
        Ok(())
    }

    /// Whether the actor holds at least `tier`, ignoring sanctions.
    #[must_use]
    pub fn has_tier(&self, tier: RoleTier) -> bool {
        self.tier >= tier
    }
}
