use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snip_core::StorageError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("url is required")]
    EmptyInput,
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("short url not found")]
    NotFound,
    #[error("short url has been deleted")]
    Gone,
    #[error("url already shortened: {0}")]
    Conflict(String),
    #[error("storage operation failed: {0}")]
    Storage(#[source] StorageError),
}

/// Storage kinds with a client-facing status get their own variant; the rest
/// stay wrapped and answer 500.
impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::EmptyInput => AppError::EmptyInput,
            StorageError::NotFound(_) => AppError::NotFound,
            StorageError::Gone(_) => AppError::Gone,
            StorageError::Duplicate(short_url) => AppError::Conflict(short_url),
            other => AppError::Storage(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::EmptyInput | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Gone => StatusCode::GONE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Conflict(short_url) => (status, short_url).into_response(),
            AppError::Storage(source) => {
                error!(error = %source, "storage operation failed");
                (status, "internal server error").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}
