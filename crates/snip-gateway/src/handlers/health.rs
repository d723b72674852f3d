use crate::error::{AppError, Result};
use crate::model::HealthResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

/// Any backend failure answers 500, whatever its kind.
pub async fn ping_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state
        .storage()
        .health_check()
        .await
        .map_err(AppError::Storage)?;
    Ok(Json(HealthResponse { status: "ok" }))
}
