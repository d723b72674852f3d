use crate::error::{AppError, Result};
use axum::http::HeaderValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use snip_core::{BatchRequest, BatchResponse, UserUrl};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Decodes a JSON request body regardless of its `Content-Type`.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| AppError::BadRequest(err.to_string()))
}

/// Rejects URLs that could never be sent back in a `Location` header.
pub fn ensure_redirectable(original_url: &str) -> Result<()> {
    HeaderValue::from_str(original_url)
        .map(drop)
        .map_err(|_| AppError::BadRequest(format!("url cannot be redirected to: {original_url:?}")))
}
