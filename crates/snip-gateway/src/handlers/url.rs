use crate::auth::OwnerId;
use crate::error::{AppError, Result};
use crate::model::{ensure_redirectable, parse_json, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use snip_core::{ShortToken, StorageError};
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// `POST /` with the URL as the raw body.
pub async fn create_text_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<Response> {
    let original_url = std::str::from_utf8(&body)
        .map_err(|err| AppError::BadRequest(err.to_string()))?
        .trim();
    ensure_redirectable(original_url)?;

    let (status, short_url) = match state.storage().write(original_url, owner.as_str()).await {
        Ok(short_url) => (StatusCode::CREATED, short_url),
        Err(StorageError::Duplicate(short_url)) => (StatusCode::CONFLICT, short_url),
        Err(err) => return Err(err.into()),
    };

    Ok((status, [(CONTENT_TYPE, TEXT_PLAIN)], short_url).into_response())
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn create_json_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<Response> {
    let request: ShortenRequest = parse_json(&body)?;
    ensure_redirectable(&request.url)?;

    let (status, result) = match state.storage().write(&request.url, owner.as_str()).await {
        Ok(short_url) => (StatusCode::CREATED, short_url),
        Err(StorageError::Duplicate(short_url)) => (StatusCode::CONFLICT, short_url),
        Err(err) => return Err(err.into()),
    };

    Ok((status, Json(ShortenResponse { result })).into_response())
}

/// `GET /{id}` redirects to the original URL.
pub async fn redirect_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    // A token that is not hex was never issued.
    let token = ShortToken::parse(id).map_err(|err| {
        debug!(error = %err, "rejecting malformed token");
        AppError::NotFound
    })?;

    let original_url = state.storage().read(&token).await?;
    let location = HeaderValue::from_str(&original_url)
        .map_err(|err| StorageError::Malformed(format!("stored url for {token}: {err}")))?;

    Ok((StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response())
}
