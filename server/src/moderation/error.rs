//! Moderation error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::permissions::AuthorizationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Actor may not perform the operation, or the target is protected.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Target is not in the source state the transition requires.
    #[error("{0}")]
    Precondition(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// A multi-write operation left its writes partially applied.
    #[error("consistency failure: {0}")]
    Consistency(String),

    #[error("Store error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ModerationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSlug(slug) => {
                Self::Conflict(format!("slug '{slug}' is already in use"))
            }
            StoreError::Consistency(detail) => Self::Consistency(detail),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Authorization(ref e) => {
                let mut body = serde_json::json!({"error": "forbidden", "message": e.to_string()});
                if let AuthorizationError::InsufficientTier { required, .. } = e {
                    body["required"] = serde_json::json!(required);
                }
                (StatusCode::FORBIDDEN, body)
            }
            Self::Precondition(msg) => (
                StatusCode::CONFLICT,
                serde_json::json!({"error": "precondition_failed", "message": msg}),
            ),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({"error": "not_found", "message": format!("{what} not found")}),
            ),
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": "validation", "message": msg}),
            ),
            Self::Conflict(msg) => (
                StatusCode::CONFLICT,
                serde_json::json!({"error": "conflict", "message": msg}),
            ),
            Self::Consistency(detail) => {
                tracing::error!(detail = %detail, "Consistency failure in moderation store");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({
                        "error": "consistency",
                        "message": "Operation partially applied; operator attention required",
                    }),
                )
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "Moderation store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"error": "internal", "message": "Internal server error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
