use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// One RF detection. Primary identity tuple is `(time, kit_id, freq_mhz)`.
#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct SignalObservation {
    pub time: DateTime<Utc>,
    pub kit_id: String,
    pub freq_mhz: f64,
    pub power_dbm: Option<f64>,
    pub bandwidth_mhz: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub detection_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalQuery {
    #[serde(default)]
    pub time_range: Option<String>,
    pub kit_id: Option<String>,
    pub detection_type: Option<String>,
    pub min_freq_mhz: Option<f64>,
    pub max_freq_mhz: Option<f64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalListResponse {
    pub signals: Vec<SignalObservation>,
    pub count: usize,
    pub time_range: crate::time_range::TimeRange,
}
