//! Moderation HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use super::error::ModerationError;
use super::types::{
    ArchivedPost, BanRequest, Category, CreateCategoryRequest, ForumUser, MoveCategoryRequest,
    Post, PostView, QueueQuery, SetActiveRequest, SoftDeleteRequest, TransitionResponse,
};
use super::{categories, posts, users};
use crate::api::AppState;
use crate::permissions::Actor;

type Transition<T> = Result<Json<TransitionResponse<T>>, ModerationError>;

// ============================================================================
// Posts
// ============================================================================

/// `GET /api/forum/posts/{id}`
#[tracing::instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostView>, ModerationError> {
    let view = posts::view_post(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(view))
}

/// `POST /api/forum/posts/{id}/hidden`
#[tracing::instrument(skip(state))]
pub async fn toggle_hidden(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Transition<Post> {
    let outcome = posts::toggle_hidden(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/posts/{id}/pin`
#[tracing::instrument(skip(state))]
pub async fn toggle_local_pin(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Transition<Post> {
    let outcome = posts::toggle_local_pin(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/posts/{id}/global-pin`
#[tracing::instrument(skip(state))]
pub async fn toggle_global_pin(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Transition<Post> {
    let outcome = posts::toggle_global_pin(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/posts/{id}/delete`
///
/// The body is optional; `{"reason": "..."}` records a reason.
#[tracing::instrument(skip(state))]
pub async fn soft_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
    body: Option<Json<SoftDeleteRequest>>,
) -> Transition<Post> {
    let reason = body.and_then(|Json(body)| body.reason);
    let outcome = posts::soft_delete(state.store.as_ref(), &actor, post_id, reason).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/posts/{id}/restore`
#[tracing::instrument(skip(state))]
pub async fn restore(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Transition<Post> {
    let outcome = posts::restore(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/posts/{id}/archive`
#[tracing::instrument(skip(state))]
pub async fn archive(
    State(state): State<AppState>,
    actor: Actor,
    Path(post_id): Path<Uuid>,
) -> Transition<ArchivedPost> {
    let outcome = posts::archive(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(outcome.into()))
}

/// `GET /api/forum/queue`
#[tracing::instrument(skip(state))]
pub async fn moderation_queue(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Vec<Post>>, ModerationError> {
    let queue =
        posts::moderation_queue(state.store.as_ref(), &actor, query.limit, query.offset).await?;
    Ok(Json(queue))
}

/// `GET /api/forum/archive/{original_id}`
#[tracing::instrument(skip(state))]
pub async fn get_tombstone(
    State(state): State<AppState>,
    actor: Actor,
    Path(original_id): Path<Uuid>,
) -> Result<Json<ArchivedPost>, ModerationError> {
    let tombstone = posts::get_tombstone(state.store.as_ref(), &actor, original_id).await?;
    Ok(Json(tombstone))
}

// ============================================================================
// Categories
// ============================================================================

/// `GET /api/forum/categories`
#[tracing::instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Category>>, ModerationError> {
    let list = categories::list_categories(state.store.as_ref(), &actor).await?;
    Ok(Json(list))
}

/// `POST /api/forum/categories`
#[tracing::instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateCategoryRequest>,
) -> Transition<Category> {
    let outcome = categories::create_category(state.store.as_ref(), &actor, body).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/categories/{id}/move`
#[tracing::instrument(skip(state))]
pub async fn move_category(
    State(state): State<AppState>,
    actor: Actor,
    Path(category_id): Path<Uuid>,
    Json(body): Json<MoveCategoryRequest>,
) -> Transition<Category> {
    let outcome =
        categories::move_category(state.store.as_ref(), &actor, category_id, body.direction)
            .await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/categories/{id}/archive`
#[tracing::instrument(skip(state))]
pub async fn archive_category(
    State(state): State<AppState>,
    actor: Actor,
    Path(category_id): Path<Uuid>,
) -> Transition<Category> {
    let outcome = categories::archive_category(state.store.as_ref(), &actor, category_id).await?;
    Ok(Json(outcome.into()))
}

/// `PUT /api/forum/categories/{id}/active`
#[tracing::instrument(skip(state))]
pub async fn set_category_active(
    State(state): State<AppState>,
    actor: Actor,
    Path(category_id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> Transition<Category> {
    let outcome = categories::set_category_active(
        state.store.as_ref(),
        &actor,
        category_id,
        body.is_active,
    )
    .await?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// Users
// ============================================================================

/// `POST /api/forum/users/{id}/ban`
#[tracing::instrument(skip(state, body))]
pub async fn ban_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
    Json(body): Json<BanRequest>,
) -> Transition<ForumUser> {
    let outcome = users::ban(state.store.as_ref(), &actor, user_id, &body.reason).await?;
    Ok(Json(outcome.into()))
}

/// `DELETE /api/forum/users/{id}/ban`
#[tracing::instrument(skip(state))]
pub async fn unban_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Transition<ForumUser> {
    let outcome = users::unban(state.store.as_ref(), &actor, user_id).await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/forum/users/{id}/read-only`
#[tracing::instrument(skip(state))]
pub async fn toggle_read_only(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Transition<ForumUser> {
    let outcome = users::toggle_read_only(state.store.as_ref(), &actor, user_id).await?;
    Ok(Json(outcome.into()))
}

/// `PUT /api/forum/users/{id}/moderator`
#[tracing::instrument(skip(state))]
pub async fn grant_moderator(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Transition<ForumUser> {
    let outcome = users::grant_moderator(state.store.as_ref(), &actor, user_id).await?;
    Ok(Json(outcome.into()))
}

/// `DELETE /api/forum/users/{id}/moderator`
#[tracing::instrument(skip(state))]
pub async fn revoke_moderator(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Transition<ForumUser> {
    let outcome = users::revoke_moderator(state.store.as_ref(), &actor, user_id).await?;
    Ok(Json(outcome.into()))
}
