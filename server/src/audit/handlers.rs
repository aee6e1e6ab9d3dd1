//! Moderation log HTTP handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::service::{self, ChainReport, LogPage};
use super::types::{ActionType, LogFilter, TargetType};
use crate::api::AppState;
use crate::moderation::ModerationError;
use crate::permissions::Actor;

/// Query string for `GET /api/forum/log`.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub target_type: Option<TargetType>,
    pub target_id: Option<Uuid>,
    pub moderator_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LogQuery {
    fn into_filter(self, default_limit: i64) -> LogFilter {
        LogFilter {
            target_type: self.target_type,
            target_id: self.target_id,
            moderator_id: self.moderator_id,
            action_type: self.action_type,
            limit: self.limit.unwrap_or(default_limit),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// `GET /api/forum/log`
#[tracing::instrument(skip(state))]
pub async fn list_log(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogPage>, ModerationError> {
    let filter = query.into_filter(state.config.audit_page_limit);
    let page = service::list_entries(state.store.as_ref(), &actor, filter).await?;
    Ok(Json(page))
}

/// `GET /api/forum/log/verify`
#[tracing::instrument(skip(state))]
pub async fn verify_log(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<ChainReport>, ModerationError> {
    let report = service::verify(state.store.as_ref(), &actor).await?;
    Ok(Json(report))
}
