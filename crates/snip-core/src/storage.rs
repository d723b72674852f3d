use crate::error::Result;
use crate::token::ShortToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A short URL owned by a user, as returned by [`Storage::read_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    /// Fully qualified short URL.
    pub short_url: String,
    pub original_url: String,
}

/// One entry of a batch create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub original_url: String,
}

/// The result paired with a [`BatchRequest`], in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub correlation_id: String,
    pub short_url: String,
}

/// The contract every storage backend satisfies.
///
/// `owner` is the opaque value of the caller's `auth` cookie. It groups the
/// records a browser created; it is not a verified identity. Reads by token
/// ignore it, listing and deletion enforce it.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Stores the URL for `owner` and returns the fully qualified short URL.
    ///
    /// Returns `Err(EmptyInput)` for an empty URL. Backends that enforce
    /// uniqueness return `Err(Duplicate(short_url))` when the URL already
    /// existed; the carried short URL is the one originally issued.
    async fn write(&self, original_url: &str, owner: &str) -> Result<String>;

    /// Resolves a token to its original URL, regardless of owner.
    ///
    /// Returns `Err(NotFound)` if the token was never written and `Err(Gone)`
    /// if it was soft-deleted.
    async fn read(&self, token: &ShortToken) -> Result<String>;

    /// Lists every live record owned by `owner`, in no particular order.
    ///
    /// Returns `Err(NotFound)` when the owner has none.
    async fn read_all(&self, owner: &str) -> Result<Vec<UserUrl>>;

    /// Stores every entry as a unit. Either all entries are stored or none.
    ///
    /// Responses are returned in the order the requests were submitted.
    async fn batch(&self, entries: Vec<BatchRequest>, owner: &str) -> Result<Vec<BatchResponse>>;

    /// Soft-deletes the given tokens, but only where `owner` owns them.
    ///
    /// Tokens the owner does not own are skipped without error.
    async fn delete(&self, owner: &str, tokens: &[ShortToken]) -> Result<()>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> Result<()>;
}
