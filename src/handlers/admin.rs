use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::config_db::derive_kit_id;
use crate::errors::AppError;
use crate::models::kit::{AddKitRequest, Kit, ProbeResult, TestKitRequest};
use crate::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// §4.5 `/api/admin/kits` POST — registry insert; the supervisor picks the new kit
/// up within one fast tick via the registry's broadcast channel, not via this handler.
pub async fn add_kit(
    State(state): State<AppState>,
    Json(req): Json<AddKitRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.api_url.trim().is_empty() {
        return Err(AppError::Validation("api_url is required".to_string()));
    }
    let kit_id = derive_kit_id(&req.api_url);
    let kit = state.config_db.add_kit(
        &kit_id,
        req.name.as_deref().unwrap_or(&kit_id),
        req.location.as_deref(),
        &req.api_url,
        req.enabled,
    )?;
    Ok((StatusCode::CREATED, Json(kit)))
}

pub async fn remove_kit(
    State(state): State<AppState>,
    Path(kit_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.config_db.remove_kit(&kit_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// §4.5 probe: synchronous, with its own 10s deadline independent of the collector's
/// poll cadence.
pub async fn test_kit(
    State(state): State<AppState>,
    Json(req): Json<TestKitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let api_url = match (&req.api_url, &req.kit_id) {
        (Some(url), _) => url.clone(),
        (None, Some(kit_id)) => {
            let kit: Option<Kit> = state.config_db.get_kit(kit_id)?;
            kit.ok_or_else(|| AppError::Validation(format!("unknown kit_id '{kit_id}'")))?
                .api_url
        }
        (None, None) => {
            return Err(AppError::Validation(
                "either api_url or kit_id is required".to_string(),
            ))
        }
    };

    let status_url = format!("{}/status", api_url.trim_end_matches('/'));
    let start = Instant::now();
    let result = state
        .http_client
        .get(&status_url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await;
    let round_trip_ms = start.elapsed().as_millis() as u64;

    let probe = match result {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let reported_kit_id = body
                .get("kit_id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            ProbeResult {
                reachable: true,
                round_trip_ms,
                reported_kit_id,
                error: None,
            }
        }
        Ok(resp) => ProbeResult {
            reachable: false,
            round_trip_ms,
            reported_kit_id: None,
            error: Some(format!("http {}", resp.status())),
        },
        Err(e) => ProbeResult {
            reachable: false,
            round_trip_ms,
            reported_kit_id: None,
            error: Some(e.to_string()),
        },
    };

    Ok(Json(probe))
}
