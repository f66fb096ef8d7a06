use chrono::{Duration, Utc};
use clickhouse::Client;

use crate::errors::AppError;
use crate::models::pattern::{PatternResponse, RepeatedDroneFinding, SampleLocation};
use crate::patterns::{fetch_window, PatternRow};

const SILENCE_GAP: Duration = Duration::minutes(5);
const MAX_SAMPLE_LOCATIONS: usize = 20;

pub struct Params {
    pub time_window_hours: i64,
    pub min_appearances: u32,
}

impl Params {
    pub fn parse(time_window_hours: Option<i64>, min_appearances: Option<u32>) -> Result<Self, AppError> {
        let time_window_hours = time_window_hours.unwrap_or(24);
        if !(1..=168).contains(&time_window_hours) {
            return Err(AppError::Validation(
                "time_window_hours must be between 1 and 168".to_string(),
            ));
        }
        let min_appearances = min_appearances.unwrap_or(2);
        if min_appearances < 2 {
            return Err(AppError::Validation(
                "min_appearances must be at least 2".to_string(),
            ));
        }
        Ok(Self {
            time_window_hours,
            min_appearances,
        })
    }
}

pub async fn find(ch: &Client, params: &Params) -> Result<PatternResponse<RepeatedDroneFinding>, AppError> {
    let since = Utc::now() - Duration::hours(params.time_window_hours);
    let where_clause = format!(
        "time >= parseDateTime64BestEffort('{}', 6)",
        since.to_rfc3339()
    );
    let rows = fetch_window(ch, &where_clause).await?;

    let mut findings = Vec::new();
    for group in group_by_drone(&rows) {
        let appearance_count = count_appearances(&group);
        if appearance_count < params.min_appearances {
            continue;
        }
        let first_seen = group.first().unwrap().time;
        let last_seen = group.last().unwrap().time;
        let sample_locations = sample_locations(&group);
        findings.push(RepeatedDroneFinding {
            drone_id: group[0].drone_id.clone(),
            first_seen,
            last_seen,
            appearance_count,
            sample_locations,
        });
    }
    findings.sort_by(|a, b| {
        b.appearance_count
            .cmp(&a.appearance_count)
            .then(b.last_seen.cmp(&a.last_seen))
    });
    findings.truncate(1000);

    let count = findings.len();
    Ok(PatternResponse { findings, count })
}

/// Rows already come back `ORDER BY drone_id, time` from the shared fetch.
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

/// An appearance is a maximal contiguous run separated by no more than `SILENCE_GAP`
/// of silence from the next observation.
fn count_appearances(rows: &[&PatternRow]) -> u32 {
    if rows.is_empty() {
        return 0;
    }
    let mut runs = 1u32;
    for pair in rows.windows(2) {
        if pair[1].time - pair[0].time > SILENCE_GAP {
            runs += 1;
        }
    }
    runs
}

fn sample_locations(rows: &[&PatternRow]) -> Vec<SampleLocation> {
    if rows.len() <= MAX_SAMPLE_LOCATIONS {
        return rows
            .iter()
            .map(|r| SampleLocation {
                time: r.time,
                lat: r.lat,
                lon: r.lon,
            })
            .collect();
    }
    let stride = rows.len() as f64 / MAX_SAMPLE_LOCATIONS as f64;
    (0..MAX_SAMPLE_LOCATIONS)
        .map(|i| {
            let idx = ((i as f64) * stride) as usize;
            let r = rows[idx.min(rows.len() - 1)];
            SampleLocation {
                time: r.time,
                lat: r.lat,
                lon: r.lon,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(drone_id: &str, minutes: i64) -> PatternRow {
        PatternRow {
            time: Utc::now() + Duration::minutes(minutes),
            kit_id: "k1".to_string(),
            drone_id: drone_id.to_string(),
            lat: Some(1.0),
            lon: Some(1.0),
            alt: None,
            speed: None,
            rssi: None,
            operator_id: None,
            pilot_lat: None,
            pilot_lon: None,
        }
    }

    #[test]
    fn appearance_count_breaks_on_silence_gap() {
        let rows = vec![row("d1", 0), row("d1", 1), row("d1", 10), row("d1", 11)];
        let refs: Vec<&PatternRow> = rows.iter().collect();
        assert_eq!(count_appearances(&refs), 2);
    }

    #[test]
    fn single_contiguous_run_is_one_appearance() {
        let rows = vec![row("d1", 0), row("d1", 2), row("d1", 4)];
        let refs: Vec<&PatternRow> = rows.iter().collect();
        assert_eq!(count_appearances(&refs), 1);
    }

    #[test]
    fn params_rejects_out_of_range_window() {
        assert!(Params::parse(Some(200), Some(2)).is_err());
        assert!(Params::parse(Some(1), Some(1)).is_err());
    }
}
