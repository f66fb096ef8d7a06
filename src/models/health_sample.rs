use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// Kit-health sample. Primary identity tuple is `(time, kit_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct HealthSample {
    pub time: DateTime<Utc>,
    pub kit_id: String,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub gps_alt: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub uptime_hours: Option<f64>,
    pub temp_cpu: Option<f64>,
    pub temp_gpu: Option<f64>,
}
