use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// One positional sample from one kit about one track.
///
/// Primary identity tuple is `(time, kit_id, drone_id)`; the storage layer upserts on it.
#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct DroneObservation {
    pub time: DateTime<Utc>,
    pub kit_id: String,
    pub drone_id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub pilot_lat: Option<f64>,
    pub pilot_lon: Option<f64>,
    pub home_lat: Option<f64>,
    pub home_lon: Option<f64>,
    pub mac: Option<String>,
    pub rssi: Option<i32>,
    pub freq: Option<f64>,
    pub ua_type: Option<String>,
    pub operator_id: Option<String>,
    pub caa_id: Option<String>,
    pub rid_make: Option<String>,
    pub rid_model: Option<String>,
    pub rid_source: Option<String>,
    pub track_type: String,
}

impl DroneObservation {
    /// CSV column order fixed by the downstream API contract.
    pub const CSV_COLUMNS: &'static [&'static str] = &[
        "time",
        "kit_id",
        "drone_id",
        "lat",
        "lon",
        "alt",
        "speed",
        "heading",
        "pilot_lat",
        "pilot_lon",
        "home_lat",
        "home_lon",
        "mac",
        "rssi",
        "freq",
        "ua_type",
        "operator_id",
        "caa_id",
        "rid_make",
        "rid_model",
        "rid_source",
        "track_type",
    ];

    pub fn write_csv_row(&self, out: &mut String) {
        use std::fmt::Write;

        fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_default()
        }

        let _ = write!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            self.time.to_rfc3339(),
            csv_escape(&self.kit_id),
            csv_escape(&self.drone_id),
            opt(&self.lat),
            opt(&self.lon),
            opt(&self.alt),
            opt(&self.speed),
            opt(&self.heading),
            opt(&self.pilot_lat),
            opt(&self.pilot_lon),
            opt(&self.home_lat),
            opt(&self.home_lon),
            self.mac.as_deref().map(csv_escape).unwrap_or_default(),
            opt(&self.rssi),
            opt(&self.freq),
            self.ua_type.as_deref().map(csv_escape).unwrap_or_default(),
            self.operator_id.as_deref().map(csv_escape).unwrap_or_default(),
            self.caa_id.as_deref().map(csv_escape).unwrap_or_default(),
            self.rid_make.as_deref().map(csv_escape).unwrap_or_default(),
            self.rid_model.as_deref().map(csv_escape).unwrap_or_default(),
            self.rid_source.as_deref().map(csv_escape).unwrap_or_default(),
            csv_escape(&self.track_type),
        );
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DroneQuery {
    #[serde(default)]
    pub time_range: Option<String>,
    /// Comma-separated kit_id filter.
    pub kit_id: Option<String>,
    pub rid_make: Option<String>,
    pub track_type: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroneListResponse {
    pub drones: Vec<DroneObservation>,
    pub count: usize,
    pub time_range: crate::time_range::TimeRange,
}
