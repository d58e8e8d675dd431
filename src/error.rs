use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures of a TODO request. `MissingSubject` comes from request
/// validation in the handlers; the rest are reported by
/// [`crate::service::TodoService`].
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("{0}")]
    Validation(String),

    #[error("subject is required")]
    MissingSubject,

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("store call cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for TodoError {
    fn from(err: rusqlite::Error) -> Self {
        TodoError::Store(StoreError::Sqlite(err))
    }
}

impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        match self {
            TodoError::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            TodoError::MissingSubject => StatusCode::BAD_REQUEST.into_response(),
            TodoError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            TodoError::Store(err) => {
                error!(error = %err, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}
