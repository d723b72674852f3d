use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure to turn a token back into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token has odd length {0}")]
    OddLength(usize),
    #[error("invalid character {c:?} at position {index}")]
    InvalidCharacter { c: char, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short token: {0}")]
    InvalidToken(#[from] DecodeError),
}

/// Errors returned by every storage backend.
///
/// The handler layer is the only place these are mapped to transport status
/// codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("nothing to shorten")]
    EmptyInput,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("short url has been deleted: {0}")]
    Gone(String),
    /// The original URL was already shortened. Carries the existing short URL.
    #[error("url already shortened as {0}")]
    Duplicate(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is malformed: {0}")]
    Malformed(String),
    #[error("storage operation failed: {0}")]
    Internal(String),
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
