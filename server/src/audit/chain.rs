//! Hash chaining for the moderation log.
//!
//! Every entry commits to its predecessor's hash, so editing or removing a
//! persisted entry breaks every link after it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::types::{ActionType, ModerationAction, TargetType};

/// `prev_hash` of the first entry in the log.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// First point at which the chain fails to verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// Position in append order.
    pub index: usize,
    pub entry_id: Uuid,
    pub kind: ChainBreakKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainBreakKind {
    /// `prev_hash` does not match the preceding entry's hash.
    BrokenLink,
    /// Stored hash does not match the entry's content.
    ContentMismatch,
}

/// Compute the hash for one entry.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn compute_entry_hash(
    prev_hash: &str,
    id: Uuid,
    moderator_id: Uuid,
    action_type: ActionType,
    target_type: TargetType,
    target_id: Uuid,
    reason: Option<&str>,
    created_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(b"\n");
    hasher.update(id.as_bytes());
    hasher.update(moderator_id.as_bytes());
    hasher.update(action_type.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(target_type.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(target_id.as_bytes());
    // Length prefix keeps "no reason" distinct from an empty reason.
    match reason {
        Some(reason) => {
            hasher.update((reason.len() as u64).to_be_bytes());
            hasher.update(reason.as_bytes());
        }
        None => hasher.update(u64::MAX.to_be_bytes()),
    }
    hasher.update(
        created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true)
            .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Recompute the hash of a stored entry.
#[must_use]
pub fn rehash(entry: &ModerationAction) -> String {
    compute_entry_hash(
        &entry.prev_hash,
        entry.id,
        entry.moderator_id,
        entry.action_type,
        entry.target_type,
        entry.target_id,
        entry.reason.as_deref(),
        entry.created_at,
    )
}

/// Verify a log given in append order.
pub fn verify_chain(entries: &[ModerationAction]) -> Result<(), ChainBreak> {
    let mut expected_prev = GENESIS_HASH;

    for (index, entry) in entries.iter().enumerate() {
        if entry.prev_hash != expected_prev {
            return Err(ChainBreak {
                index,
                entry_id: entry.id,
                kind: ChainBreakKind::BrokenLink,
            });
        }
        if rehash(entry) != entry.entry_hash {
            return Err(ChainBreak {
                index,
                entry_id: entry.id,
                kind: ChainBreakKind::ContentMismatch,
            });
        }
        expected_prev = entry.entry_hash.as_str();
    }

    Ok(())
}
