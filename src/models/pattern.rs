use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepeatedDroneFinding {
    pub drone_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub appearance_count: u32,
    pub sample_locations: Vec<SampleLocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleLocation {
    pub time: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatedFinding {
    pub cluster_time: DateTime<Utc>,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub drone_ids: Vec<String>,
    pub score: Severity,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotReuseMethod {
    SharedOperator,
    PilotProximity,
}

#[derive(Debug, Clone, Serialize)]
pub struct PilotReuseFinding {
    pub method: PilotReuseMethod,
    pub shared_operator_id: Option<String>,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
    pub drone_ids: Vec<DroneSeenRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroneSeenRange {
    pub drone_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Speed,
    Altitude,
    RapidAltitudeChange,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyFinding {
    pub drone_id: String,
    pub kit_id: String,
    pub time: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiKitFinding {
    pub drone_id: String,
    pub bucket: DateTime<Utc>,
    pub distinct_kits: u32,
    pub triangulation_possible: bool,
    pub observations: Vec<MultiKitObservation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiKitObservation {
    pub kit_id: String,
    pub rssi: Option<i32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternResponse<T> {
    pub findings: Vec<T>,
    pub count: usize,
}
