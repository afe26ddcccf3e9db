use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::db::DbError;

/// Errors a handler can surface. Ownership misses collapse into `NotFound`
/// so a foreign record is indistinguishable from a missing one.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound | AppError::Db(DbError::NotFound) => {
                json_error(StatusCode::NOT_FOUND, "not_found", "not found")
            }
            AppError::Validation(message) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            AppError::Db(err) => {
                tracing::error!(error = %err, "database error");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error",
                )
            }
            AppError::Session(err) => {
                tracing::error!(error = %err, "session error");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error",
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error",
                )
            }
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
