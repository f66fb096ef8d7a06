use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::drone::DroneObservation;
use crate::models::health_sample::HealthSample;
use crate::models::signal::SignalObservation;
use crate::spatial::is_zero_zero;

/// Accepts ISO-8601, epoch seconds, or epoch milliseconds; a missing/unparseable
/// timestamp falls back to the receive instant (§4.3 normalization rules).
pub fn parse_timestamp(v: Option<&Value>, receive_instant: DateTime<Utc>) -> DateTime<Utc> {
    let Some(v) = v else {
        return receive_instant;
    };
    match v {
        Value::String(s) => parse_timestamp_str(s).unwrap_or(receive_instant),
        Value::Number(n) => n
            .as_f64()
            .and_then(from_epoch)
            .unwrap_or(receive_instant),
        _ => receive_instant,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    None
}

/// Epoch seconds vs. milliseconds auto-detection: values above ~year-2001-in-seconds
/// magnitude are assumed to already be milliseconds.
fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    let millis = if n > 1_000_000_000_000.0 {
        n
    } else if n > 1_000_000_000.0 {
        n * 1000.0
    } else {
        return None;
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Defensive numeric coercion: tries each key in order, accepting both JSON numbers
/// and numeric strings; returns `None` if nothing parses.
pub fn first_number(obj: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match obj.get(key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(n) = s.parse::<f64>() {
                    return Some(n);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match obj.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// A (0,0) coordinate pair means "unknown" and must be stored as absent.
fn coord_pair(lat: Option<f64>, lon: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (lat, lon) {
        (Some(la), Some(lo)) if is_zero_zero(la, lo) => (None, None),
        other => other,
    }
}

fn infer_track_type(raw: &Value) -> String {
    let has_adsb_marker = raw.get("adsb").is_some()
        || matches!(raw.get("rid_source"), Some(Value::String(s)) if s.eq_ignore_ascii_case("adsb"))
        || matches!(first_string(raw, &["track_type"]).as_deref(), Some(t) if t.eq_ignore_ascii_case("aircraft"));
    if has_adsb_marker {
        "aircraft".to_string()
    } else {
        "drone".to_string()
    }
}

fn infer_detection_type(raw: &Value, freq_mhz: f64) -> String {
    if let Some(hint) = first_string(raw, &["detection_type"]) {
        return hint;
    }
    // Frequency-band hints as a fallback, loosely matching common RC/FPV/WiFi bands.
    if (2400.0..=2500.0).contains(&freq_mhz) || (5725.0..=5875.0).contains(&freq_mhz) {
        "wifi".to_string()
    } else if (900.0..=928.0).contains(&freq_mhz) {
        "rc_control".to_string()
    } else if (1200.0..=1300.0).contains(&freq_mhz) || (5645.0..=5945.0).contains(&freq_mhz) {
        "analog_fpv".to_string()
    } else {
        "unknown".to_string()
    }
}

/// Normalize one raw `/drones` record. Returns `None` (and logs) when the row lacks
/// the required `drone_id` field — a storage-row-kind error absorbed at the
/// normalization boundary rather than aborting the batch.
pub fn normalize_drone(raw: &Value, kit_id: &str, receive_instant: DateTime<Utc>) -> Option<DroneObservation> {
    let drone_id = first_string(raw, &["drone_id", "id", "serial"])?;
    let time = parse_timestamp(raw.get("time"), receive_instant);

    let (lat, lon) = coord_pair(first_number(raw, &["lat"]), first_number(raw, &["lon"]));
    let (pilot_lat, pilot_lon) = coord_pair(
        first_number(raw, &["pilot_lat"]),
        first_number(raw, &["pilot_lon"]),
    );
    let (home_lat, home_lon) = coord_pair(
        first_number(raw, &["home_lat"]),
        first_number(raw, &["home_lon"]),
    );

    Some(DroneObservation {
        time,
        kit_id: kit_id.to_string(),
        drone_id,
        lat,
        lon,
        alt: first_number(raw, &["alt", "altitude"]),
        speed: first_number(raw, &["speed"]),
        heading: first_number(raw, &["heading"]),
        pilot_lat,
        pilot_lon,
        home_lat,
        home_lon,
        mac: first_string(raw, &["mac"]),
        rssi: first_number(raw, &["rssi"]).map(|v| v as i32),
        freq: first_number(raw, &["freq"]),
        ua_type: first_string(raw, &["ua_type"]),
        operator_id: first_string(raw, &["operator_id"]),
        caa_id: first_string(raw, &["caa_id"]),
        rid_make: first_string(raw, &["rid_make"]),
        rid_model: first_string(raw, &["rid_model"]),
        rid_source: first_string(raw, &["rid_source"]),
        track_type: infer_track_type(raw),
    })
}

/// Normalize one raw `/signals` record.
pub fn normalize_signal(raw: &Value, kit_id: &str, receive_instant: DateTime<Utc>) -> Option<SignalObservation> {
    let freq_mhz = first_number(raw, &["freq_mhz", "freq"])?;
    let time = parse_timestamp(raw.get("time"), receive_instant);
    let (lat, lon) = coord_pair(first_number(raw, &["lat"]), first_number(raw, &["lon"]));

    Some(SignalObservation {
        time,
        kit_id: kit_id.to_string(),
        freq_mhz,
        power_dbm: first_number(raw, &["power_dbm"]),
        bandwidth_mhz: first_number(raw, &["bandwidth_mhz"]),
        lat,
        lon,
        alt: first_number(raw, &["alt"]),
        detection_type: infer_detection_type(raw, freq_mhz),
    })
}

/// Normalize one raw `/status` record.
pub fn normalize_health(raw: &Value, kit_id: &str, receive_instant: DateTime<Utc>) -> HealthSample {
    let time = parse_timestamp(raw.get("time"), receive_instant);
    let gps = raw.get("gps").cloned().unwrap_or(Value::Null);
    HealthSample {
        time,
        kit_id: kit_id.to_string(),
        gps_lat: first_number(&gps, &["lat"]),
        gps_lon: first_number(&gps, &["lon"]),
        gps_alt: first_number(&gps, &["alt"]),
        cpu_percent: first_number(raw, &["cpu_percent"]),
        memory_percent: first_number(raw, &["memory_percent"]),
        disk_percent: first_number(raw, &["disk_percent"]),
        uptime_hours: first_number(raw, &["uptime_hours"]),
        temp_cpu: first_number(raw, &["temp_cpu"]),
        temp_gpu: first_number(raw, &["temp_gpu"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_zero_pilot_coords_become_absent() {
        let raw = json!({"drone_id": "d1", "pilot_lat": 0.0, "pilot_lon": 0.0});
        let obs = normalize_drone(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.pilot_lat, None);
        assert_eq!(obs.pilot_lon, None);
    }

    #[test]
    fn missing_drone_id_is_skipped() {
        let raw = json!({"lat": 1.0});
        assert!(normalize_drone(&raw, "k1", Utc::now()).is_none());
    }

    #[test]
    fn missing_timestamp_uses_receive_instant() {
        let now = Utc::now();
        let raw = json!({"drone_id": "d1"});
        let obs = normalize_drone(&raw, "k1", now).unwrap();
        assert_eq!(obs.time, now);
    }

    #[test]
    fn epoch_seconds_and_millis_both_parse() {
        let secs = json!({"drone_id": "d1", "time": 1_700_000_000});
        let millis = json!({"drone_id": "d2", "time": 1_700_000_000_000i64});
        let a = normalize_drone(&secs, "k1", Utc::now()).unwrap();
        let b = normalize_drone(&millis, "k1", Utc::now()).unwrap();
        assert_eq!(a.time.timestamp(), 1_700_000_000);
        assert_eq!(b.time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn iso8601_timestamp_parses() {
        let raw = json!({"drone_id": "d1", "time": "2026-01-01T00:00:00Z"});
        let obs = normalize_drone(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.time.timestamp(), 1_767_225_600);
    }

    #[test]
    fn numeric_field_as_string_coerces() {
        let raw = json!({"drone_id": "d1", "alt": "123.5"});
        let obs = normalize_drone(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.alt, Some(123.5));
    }

    #[test]
    fn adsb_marker_infers_aircraft() {
        let raw = json!({"drone_id": "d1", "rid_source": "ADSB"});
        let obs = normalize_drone(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.track_type, "aircraft");
    }

    #[test]
    fn no_adsb_marker_infers_drone() {
        let raw = json!({"drone_id": "d1"});
        let obs = normalize_drone(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.track_type, "drone");
    }

    #[test]
    fn missing_freq_mhz_skips_signal_row() {
        let raw = json!({"power_dbm": -40.0});
        assert!(normalize_signal(&raw, "k1", Utc::now()).is_none());
    }

    #[test]
    fn detection_type_falls_back_to_frequency_band() {
        let raw = json!({"freq_mhz": 2450.0});
        let obs = normalize_signal(&raw, "k1", Utc::now()).unwrap();
        assert_eq!(obs.detection_type, "wifi");
    }
}
