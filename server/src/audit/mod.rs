//! Moderation Log
//!
//! Append-only record of every completed moderation transition. Entries are
//! hash-chained so that edits or deletions made outside the application are
//! detectable. Rejected attempts are never logged.

mod chain;
mod handlers;
pub mod service;
mod types;

use axum::{routing::get, Router};

use crate::api::AppState;

pub use chain::{compute_entry_hash, rehash, verify_chain, ChainBreak, ChainBreakKind, GENESIS_HASH};
pub use service::{ChainReport, LogPage};
pub use types::{
    ActionType, AuditDraft, LogFilter, ModerationAction, TargetType, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};

/// Log routes, mounted under `/api/forum/log`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_log))
        .route("/verify", get(handlers::verify_log))
}
