use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use clickhouse::Client;

use crate::errors::AppError;
use crate::models::pattern::{MultiKitFinding, MultiKitObservation, PatternResponse};
use crate::patterns::{fetch_window, PatternRow};

pub struct Params {
    pub time_window_minutes: i64,
}

impl Params {
    pub fn parse(time_window_minutes: Option<i64>) -> Result<Self, AppError> {
        let time_window_minutes = time_window_minutes.unwrap_or(60);
        if !(1..=1440).contains(&time_window_minutes) {
            return Err(AppError::Validation(
                "time_window_minutes must be between 1 and 1440".to_string(),
            ));
        }
        Ok(Self { time_window_minutes })
    }
}

pub async fn find(ch: &Client, params: &Params) -> Result<PatternResponse<MultiKitFinding>, AppError> {
    let since = Utc::now() - Duration::minutes(params.time_window_minutes);
    let where_clause = format!(
        "time >= parseDateTime64BestEffort('{}', 6)",
        since.to_rfc3339()
    );
    let rows = fetch_window(ch, &where_clause).await?;
    let buckets = bucket_by_drone_and_kit(&rows);

    let mut findings = Vec::new();
    for ((bucket, drone_id), per_kit) in buckets {
        if per_kit.len() < 2 {
            continue;
        }
        let mut observations: Vec<MultiKitObservation> = per_kit
            .values()
            .map(|r| MultiKitObservation {
                kit_id: r.kit_id.clone(),
                rssi: r.rssi,
                lat: r.lat,
                lon: r.lon,
                time: r.time,
            })
            .collect();
        observations.sort_by(|a, b| a.kit_id.cmp(&b.kit_id));

        let distinct_kits = observations.len() as u32;
        findings.push(MultiKitFinding {
            drone_id: drone_id.to_string(),
            bucket: bucket_to_time(bucket),
            distinct_kits,
            triangulation_possible: distinct_kits >= 3,
            observations,
        });
    }

    findings.sort_by(|a, b| b.distinct_kits.cmp(&a.distinct_kits).then(b.bucket.cmp(&a.bucket)));
    findings.truncate(1000);

    let count = findings.len();
    Ok(PatternResponse { findings, count })
}

/// (bucket, drone_id) -> kit_id -> most recent observation in that bucket.
fn bucket_by_drone_and_kit(rows: &[PatternRow]) -> HashMap<(i64, &str), HashMap<&str, &PatternRow>> {
    let mut buckets: HashMap<(i64, &str), HashMap<&str, &PatternRow>> = HashMap::new();
    for row in rows {
        let bucket = row.time.timestamp() / 60;
        let per_kit = buckets.entry((bucket, row.drone_id.as_str())).or_default();
        per_kit
            .entry(row.kit_id.as_str())
            .and_modify(|existing| {
                if row.time > existing.time {
                    *existing = row;
                }
            })
            .or_insert(row);
    }
    buckets
}

fn bucket_to_time(bucket_minutes: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(bucket_minutes * 60, 0).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kit_id: &str, drone_id: &str, rssi: i32) -> PatternRow {
        PatternRow {
            time: Utc::now(),
            kit_id: kit_id.to_string(),
            drone_id: drone_id.to_string(),
            lat: None,
            lon: None,
            alt: None,
            speed: None,
            rssi: Some(rssi),
            operator_id: None,
            pilot_lat: None,
            pilot_lon: None,
        }
    }

    #[test]
    fn two_kits_do_not_trigger_triangulation() {
        let rows = vec![row("k1", "d1", -50), row("k2", "d1", -55)];
        let buckets = bucket_by_drone_and_kit(&rows);
        let per_kit = buckets.values().next().unwrap();
        assert_eq!(per_kit.len(), 2);
        assert!((per_kit.len() as u32) < 3);
    }

    #[test]
    fn three_kits_trigger_triangulation() {
        let rows = vec![row("k1", "d1", -50), row("k2", "d1", -55), row("k3", "d1", -60)];
        let buckets = bucket_by_drone_and_kit(&rows);
        let per_kit = buckets.values().next().unwrap();
        assert_eq!(per_kit.len(), 3);
        assert!((per_kit.len() as u32) >= 3);
    }
}
