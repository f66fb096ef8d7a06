pub mod anomalies;
pub mod coordinated;
pub mod multi_kit;
pub mod pilot_reuse;
pub mod repeated_drones;

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;

/// The columns every pattern query needs, fetched once per request and post-processed
/// in Rust — the same "typed row in, HashMap grouping out" idiom the teacher uses for
/// `usage_tracker::flush` and the stats handlers, rather than expressing the clustering
/// logic itself in SQL.
#[derive(Debug, Clone, Deserialize, Row)]
pub struct PatternRow {
    pub time: DateTime<Utc>,
    pub kit_id: String,
    pub drone_id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub speed: Option<f64>,
    pub rssi: Option<i32>,
    pub operator_id: Option<String>,
    pub pilot_lat: Option<f64>,
    pub pilot_lon: Option<f64>,
}

/// Reads from `drones_by_drone_id`, not `drones` directly: every pattern query below
/// groups/orders by `drone_id` first, which is exactly the secondary ordering that
/// materialized view exists for (see `migrations.rs`).
pub async fn fetch_window(ch: &Client, where_clause: &str) -> clickhouse::error::Result<Vec<PatternRow>> {
    let sql = format!(
        "SELECT time, kit_id, drone_id, lat, lon, alt, speed, rssi, operator_id, pilot_lat, pilot_lon \
         FROM drones_by_drone_id FINAL WHERE {where_clause} ORDER BY drone_id, time"
    );
    ch.query(&sql).fetch_all::<PatternRow>().await
}
