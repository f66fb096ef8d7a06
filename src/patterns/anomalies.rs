use chrono::{Duration, Utc};
use clickhouse::Client;

use crate::errors::AppError;
use crate::models::pattern::{AnomalyFinding, AnomalyKind, PatternResponse, Severity};
use crate::patterns::{fetch_window, PatternRow};

const RAPID_ALT_WINDOW: Duration = Duration::seconds(10);
const RAPID_ALT_GAP_BREAK: Duration = Duration::seconds(30);

pub struct Params {
    pub time_window_hours: i64,
}

impl Params {
    pub fn parse(time_window_hours: Option<i64>) -> Result<Self, AppError> {
        let time_window_hours = time_window_hours.unwrap_or(1);
        if !(1..=24).contains(&time_window_hours) {
            return Err(AppError::Validation(
                "time_window_hours must be between 1 and 24".to_string(),
            ));
        }
        Ok(Self { time_window_hours })
    }
}

/// `value > critical` beats `> high` beats `> medium`; equal-to-threshold never
/// qualifies — the bands are open intervals, matching the "critical if > 50" wording.
fn classify(value: f64, critical: f64, high: f64, medium: f64) -> Option<Severity> {
    if value > critical {
        Some(Severity::Critical)
    } else if value > high {
        Some(Severity::High)
    } else if value > medium {
        Some(Severity::Medium)
    } else {
        None
    }
}

fn classify_speed(speed_mps: f64) -> Option<Severity> {
    classify(speed_mps, 50.0, 40.0, 30.0)
}

fn classify_altitude(alt_m: f64) -> Option<Severity> {
    classify(alt_m, 500.0, 450.0, 400.0)
}

fn classify_delta_alt(delta_m: f64) -> Option<Severity> {
    classify(delta_m, 100.0, 75.0, 50.0)
}

pub async fn find(ch: &Client, params: &Params) -> Result<PatternResponse<AnomalyFinding>, AppError> {
    let since = Utc::now() - Duration::hours(params.time_window_hours);
    let where_clause = format!(
        "time >= parseDateTime64BestEffort('{}', 6)",
        since.to_rfc3339()
    );
    let rows = fetch_window(ch, &where_clause).await?;

    let mut findings = Vec::new();

    for row in &rows {
        if let Some(speed) = row.speed {
            if let Some(severity) = classify_speed(speed) {
                findings.push(AnomalyFinding {
                    drone_id: row.drone_id.clone(),
                    kit_id: row.kit_id.clone(),
                    time: row.time,
                    kind: AnomalyKind::Speed,
                    severity,
                    value: speed,
                });
            }
        }
        if let Some(alt) = row.alt {
            if let Some(severity) = classify_altitude(alt) {
                findings.push(AnomalyFinding {
                    drone_id: row.drone_id.clone(),
                    kit_id: row.kit_id.clone(),
                    time: row.time,
                    kind: AnomalyKind::Altitude,
                    severity,
                    value: alt,
                });
            }
        }
    }

    for group in group_by_drone(&rows) {
        findings.extend(rapid_altitude_changes(&group));
    }

    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.time.cmp(&a.time)));
    findings.truncate(1000);

    let count = findings.len();
    Ok(PatternResponse { findings, count })
}

fn group_by_drone(rows: &[PatternRow]) -> Vec<Vec<&PatternRow>> {
    let mut groups: Vec<Vec<&PatternRow>> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(last) if last[0].drone_id == row.drone_id => last.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

/// Sliding 10-second window of altitude readings; a gap over 30s resets it entirely.
/// Each reading is compared against every still-in-window prior reading and the
/// largest |delta| decides severity.
fn rapid_altitude_changes(rows: &[&PatternRow]) -> Vec<AnomalyFinding> {
    let mut findings = Vec::new();
    let mut window: Vec<&PatternRow> = Vec::new();

    for row in rows {
        let Some(alt) = row.alt else { continue };

        if let Some(last) = window.last() {
            if row.time - last.time > RAPID_ALT_GAP_BREAK {
                window.clear();
            }
        }
        window.retain(|w| row.time - w.time <= RAPID_ALT_WINDOW);

        let max_delta = window
            .iter()
            .filter_map(|w| w.alt.map(|walt| (alt - walt).abs()))
            .fold(0.0_f64, f64::max);

        if let Some(severity) = classify_delta_alt(max_delta) {
            findings.push(AnomalyFinding {
                drone_id: row.drone_id.clone(),
                kit_id: row.kit_id.clone(),
                time: row.time,
                kind: AnomalyKind::RapidAltitudeChange,
                severity,
                value: max_delta,
            });
        }

        window.push(row);
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_band_boundaries() {
        assert_eq!(classify_speed(29.99), None);
        assert_eq!(classify_speed(30.00), None);
        assert_eq!(classify_speed(40.00), Some(Severity::Medium));
        assert_eq!(classify_speed(50.01), Some(Severity::Critical));
    }

    #[test]
    fn altitude_band_boundaries() {
        assert_eq!(classify_altitude(400.0), None);
        assert_eq!(classify_altitude(450.0), Some(Severity::Medium));
        assert_eq!(classify_altitude(500.01), Some(Severity::Critical));
    }

    #[test]
    fn delta_altitude_band_boundaries() {
        assert_eq!(classify_delta_alt(49.99), None);
        assert_eq!(classify_delta_alt(50.00), None);
        assert_eq!(classify_delta_alt(75.01), Some(Severity::High));
        assert_eq!(classify_delta_alt(100.01), Some(Severity::Critical));
    }

    fn row(drone_id: &str, secs: i64, alt: f64) -> PatternRow {
        PatternRow {
            time: Utc::now() + Duration::seconds(secs),
            kit_id: "k1".to_string(),
            drone_id: drone_id.to_string(),
            lat: None,
            lon: None,
            alt: Some(alt),
            speed: None,
            rssi: None,
            operator_id: None,
            pilot_lat: None,
            pilot_lon: None,
        }
    }

    #[test]
    fn rapid_altitude_change_detected_within_window() {
        let rows = vec![row("d1", 0, 100.0), row("d1", 5, 160.0)];
        let refs: Vec<&PatternRow> = rows.iter().collect();
        let findings = rapid_altitude_changes(&refs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn gap_over_30s_breaks_continuity() {
        let rows = vec![row("d1", 0, 100.0), row("d1", 35, 200.0)];
        let refs: Vec<&PatternRow> = rows.iter().collect();
        let findings = rapid_altitude_changes(&refs);
        assert!(findings.is_empty());
    }
}
