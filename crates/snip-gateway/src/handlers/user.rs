use crate::auth::OwnerId;
use crate::error::Result;
use crate::model::parse_json;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use snip_core::{ShortToken, StorageError};
use tracing::debug;

pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Response> {
    match state.storage().read_all(owner.as_str()).await {
        Ok(urls) => Ok(Json(urls).into_response()),
        Err(StorageError::NotFound(_)) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(err) => Err(err.into()),
    }
}

/// `DELETE /api/user/urls` with a JSON array of tokens.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<StatusCode> {
    let requested: Vec<String> = parse_json(&body)?;

    // Tokens that are not hex cannot belong to anyone.
    let tokens: Vec<ShortToken> = requested
        .into_iter()
        .filter_map(|token| ShortToken::parse(token).ok())
        .collect();
    debug!(count = tokens.len(), "deleting user urls");

    state.storage().delete(owner.as_str(), &tokens).await?;
    Ok(StatusCode::ACCEPTED)
}
