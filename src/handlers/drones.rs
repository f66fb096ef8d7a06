use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::errors::AppError;
use crate::models::drone::{DroneListResponse, DroneObservation, DroneQuery};
use crate::query_builder::build_drone_where;
use crate::time_range::TimeRange;
use crate::AppState;

const MAX_LIMIT: u64 = 10_000;

pub async fn list_drones(
    State(state): State<AppState>,
    Query(query): Query<DroneQuery>,
) -> Result<impl IntoResponse, AppError> {
    let time_range = TimeRange::parse(query.time_range.as_deref())?;
    let where_clause = build_drone_where(&query, &time_range);
    let limit = query.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);

    let sql = format!(
        "SELECT time, kit_id, drone_id, lat, lon, alt, speed, heading, pilot_lat, pilot_lon, \
         home_lat, home_lon, mac, rssi, freq, ua_type, operator_id, caa_id, rid_make, rid_model, \
         rid_source, track_type FROM drones FINAL WHERE {where_clause} \
         ORDER BY time DESC LIMIT {limit}"
    );
    let drones = state.ch.query(&sql).fetch_all::<DroneObservation>().await?;
    let count = drones.len();

    Ok(Json(DroneListResponse {
        drones,
        count,
        time_range,
    }))
}
