use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::patterns::{anomalies, coordinated, multi_kit, pilot_reuse, repeated_drones};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RepeatedDronesParams {
    pub time_window_hours: Option<i64>,
    pub min_appearances: Option<u32>,
}

pub async fn repeated_drones(
    State(state): State<AppState>,
    Query(q): Query<RepeatedDronesParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = repeated_drones::Params::parse(q.time_window_hours, q.min_appearances)?;
    let response = repeated_drones::find(&state.ch, &params).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CoordinatedParams {
    pub time_window_minutes: Option<i64>,
    pub distance_threshold_m: Option<f64>,
}

pub async fn coordinated(
    State(state): State<AppState>,
    Query(q): Query<CoordinatedParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = coordinated::Params::parse(q.time_window_minutes, q.distance_threshold_m)?;
    let response = coordinated::find(&state.ch, &params).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct PilotReuseParams {
    pub time_window_hours: Option<i64>,
    pub proximity_threshold_m: Option<f64>,
}

pub async fn pilot_reuse(
    State(state): State<AppState>,
    Query(q): Query<PilotReuseParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = pilot_reuse::Params::parse(q.time_window_hours, q.proximity_threshold_m)?;
    let response = pilot_reuse::find(&state.ch, &params).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AnomaliesParams {
    pub time_window_hours: Option<i64>,
}

pub async fn anomalies(
    State(state): State<AppState>,
    Query(q): Query<AnomaliesParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = anomalies::Params::parse(q.time_window_hours)?;
    let response = anomalies::find(&state.ch, &params).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct MultiKitParams {
    pub time_window_minutes: Option<i64>,
}

pub async fn multi_kit(
    State(state): State<AppState>,
    Query(q): Query<MultiKitParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = multi_kit::Params::parse(q.time_window_minutes)?;
    let response = multi_kit::find(&state.ch, &params).await?;
    Ok(Json(response))
}
