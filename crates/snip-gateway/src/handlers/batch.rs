use crate::auth::OwnerId;
use crate::error::Result;
use crate::model::{ensure_redirectable, parse_json, BatchRequest};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

/// `POST /api/shorten/batch`; responses keep the submission order.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<Response> {
    let entries: Vec<BatchRequest> = parse_json(&body)?;
    for entry in &entries {
        ensure_redirectable(&entry.original_url)?;
    }
    let responses = state.storage().batch(entries, owner.as_str()).await?;
    Ok((StatusCode::CREATED, Json(responses)).into_response())
}
