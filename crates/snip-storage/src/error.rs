//! Conversions from backend driver errors into [`StorageError`].

pub use snip_core::error::{Result, StorageError};

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::Malformed(message),
        // Lookups go through `fetch_optional`; only the upsert's `RETURNING`
        // uses `fetch_one`, so a missing row means the statement failed.
        sqlx::Error::RowNotFound => StorageError::Query(message),
        _ => StorageError::Query(message),
    }
}

pub(crate) fn map_json_error(err: serde_json::Error) -> StorageError {
    StorageError::Internal(format!("json: {err}"))
}
