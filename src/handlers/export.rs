use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use futures_util::stream::{self, StreamExt};

use crate::errors::AppError;
use crate::models::drone::{DroneObservation, DroneQuery};
use crate::query_builder::build_drone_where;
use crate::time_range::TimeRange;
use crate::AppState;

const MAX_LIMIT: u64 = 10_000;

/// §4.4 CSV export: same query surface as `/api/drones`, fixed column order from
/// `DroneObservation::CSV_COLUMNS`, filename `wardragon_analytics_YYYYMMDD_HHMMSS.csv`.
///
/// Streamed row-by-row off a `clickhouse` `RowCursor` rather than buffered into one
/// `String` — the result set is bounded by `limit` but the spec calls this out as a
/// streaming response, and there's no reason to hold every row in memory at once.
pub async fn export_csv(
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
    let cursor = state.ch.query(&sql).fetch::<DroneObservation>()?;

    let mut header_line = DroneObservation::CSV_COLUMNS.join(",");
    header_line.push('\n');
    let header_chunk =
        stream::once(async move { Ok::<_, clickhouse::error::Error>(Bytes::from(header_line)) });

    let row_chunks = stream::try_unfold(cursor, |mut cursor| async move {
        match cursor.next().await? {
            Some(row) => {
                let mut line = String::new();
                row.write_csv_row(&mut line);
                Ok(Some((Bytes::from(line), cursor)))
            }
            None => Ok(None),
        }
    });

    let body = Body::from_stream(header_chunk.chain(row_chunks));

    let filename = format!(
        "wardragon_analytics_{}.csv",
        time_range.end.format("%Y%m%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    ))
}
