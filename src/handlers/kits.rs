use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::errors::AppError;
use crate::models::kit::{KitsQuery, KitsResponse};
use crate::AppState;

pub async fn list_kits(
    State(state): State<AppState>,
    Query(query): Query<KitsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kits = state.config_db.list_kits(query.kit_id.as_deref())?;
    let count = kits.len();
    Ok(Json(KitsResponse { kits, count }))
}
