//! Log reads for forum admins.

use serde::Serialize;

use super::chain::{verify_chain, ChainBreak};
use super::types::{LogFilter, ModerationAction};
use crate::moderation::ModerationError;
use crate::permissions::{Actor, RoleTier};
use crate::store::ModerationStore;

/// One page of the log, newest first.
#[derive(Debug, Serialize)]
pub struct LogPage {
    pub entries: Vec<ModerationAction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Result of walking the full chain.
#[derive(Debug, Serialize)]
pub struct ChainReport {
    pub valid: bool,
    pub entries: usize,
    /// Hash of the newest entry, if any.
    pub head_hash: Option<String>,
    pub first_break: Option<ChainBreak>,
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn list_entries(
    store: &dyn ModerationStore,
    actor: &Actor,
    filter: LogFilter,
) -> Result<LogPage, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let filter = filter.clamped();
    let entries = store.list_moderation_log(&filter).await?;
    let total = store.count_moderation_log(&filter).await?;

    Ok(LogPage {
        entries,
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
}

#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn verify(
    store: &dyn ModerationStore,
    actor: &Actor,
) -> Result<ChainReport, ModerationError> {
    actor.require(RoleTier::ForumAdmin)?;

    let chain = store.moderation_log_chain().await?;
    let first_break = verify_chain(&chain).err();
    if let Some(ref broken) = first_break {
        tracing::error!(
            index = broken.index,
            entry_id = %broken.entry_id,
            kind = ?broken.kind,
            "Moderation log chain verification failed"
        );
    }

    Ok(ChainReport {
        valid: first_break.is_none(),
        entries: chain.len(),
        head_hash: chain.last().map(|e| e.entry_hash.clone()),
        first_break,
    })
}
