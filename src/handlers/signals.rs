use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::errors::AppError;
use crate::models::signal::{SignalListResponse, SignalObservation, SignalQuery};
use crate::query_builder::build_signal_where;
use crate::time_range::TimeRange;
use crate::AppState;

const MAX_LIMIT: u64 = 10_000;

pub async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalQuery>,
) -> Result<impl IntoResponse, AppError> {
    let time_range = TimeRange::parse(query.time_range.as_deref())?;
    let where_clause = build_signal_where(&query, &time_range);
    let limit = query.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);

    let sql = format!(
        "SELECT time, kit_id, freq_mhz, power_dbm, bandwidth_mhz, lat, lon, alt, detection_type \
         FROM signals FINAL WHERE {where_clause} ORDER BY time DESC LIMIT {limit}"
    );
    let signals = state.ch.query(&sql).fetch_all::<SignalObservation>().await?;
    let count = signals.len();

    Ok(Json(SignalListResponse {
        signals,
        count,
        time_range,
    }))
}
