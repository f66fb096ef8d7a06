use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// §6.2 `/health`: 200 while ClickHouse answers a trivial query, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.ch.query("SELECT 1").execute().await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check: storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "detail": e.to_string() })),
            )
        }
    }
}
