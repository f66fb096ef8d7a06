use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use clickhouse::Client;

use crate::errors::AppError;
use crate::models::pattern::{DroneSeenRange, PatternResponse, PilotReuseFinding, PilotReuseMethod};
use crate::patterns::{fetch_window, PatternRow};
use crate::spatial::calc_distance_m;

pub struct Params {
    pub time_window_hours: i64,
    pub proximity_threshold_m: f64,
}

impl Params {
    pub fn parse(
        time_window_hours: Option<i64>,
        proximity_threshold_m: Option<f64>,
    ) -> Result<Self, AppError> {
        let time_window_hours = time_window_hours.unwrap_or(24);
        if !(1..=168).contains(&time_window_hours) {
            return Err(AppError::Validation(
                "time_window_hours must be between 1 and 168".to_string(),
            ));
        }
        let proximity_threshold_m = proximity_threshold_m.unwrap_or(100.0);
        if proximity_threshold_m < 1.0 {
            return Err(AppError::Validation(
                "proximity_threshold_m must be positive".to_string(),
            ));
        }
        Ok(Self {
            time_window_hours,
            proximity_threshold_m,
        })
    }
}

pub async fn find(ch: &Client, params: &Params) -> Result<PatternResponse<PilotReuseFinding>, AppError> {
    let since = Utc::now() - Duration::hours(params.time_window_hours);
    let where_clause = format!(
        "time >= parseDateTime64BestEffort('{}', 6)",
        since.to_rfc3339()
    );
    let rows = fetch_window(ch, &where_clause).await?;

    let seen_ranges = seen_ranges_by_drone(&rows);

    let mut findings = by_shared_operator(&rows, &seen_ranges);
    findings.extend(by_pilot_proximity(&rows, &seen_ranges, params.proximity_threshold_m));

    findings.sort_by(|a, b| b.drone_ids.len().cmp(&a.drone_ids.len()));
    findings.truncate(1000);

    let count = findings.len();
    Ok(PatternResponse { findings, count })
}

fn seen_ranges_by_drone(rows: &[PatternRow]) -> HashMap<&str, (DateTime<Utc>, DateTime<Utc>)> {
    let mut ranges: HashMap<&str, (DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
    for row in rows {
        ranges
            .entry(row.drone_id.as_str())
            .and_modify(|(first, last)| {
                if row.time < *first {
                    *first = row.time;
                }
                if row.time > *last {
                    *last = row.time;
                }
            })
            .or_insert((row.time, row.time));
    }
    ranges
}

fn seen_range_entries(
    drone_ids: &[&str],
    ranges: &HashMap<&str, (DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<DroneSeenRange> {
    drone_ids
        .iter()
        .filter_map(|id| {
            ranges.get(id).map(|(first, last)| DroneSeenRange {
                drone_id: id.to_string(),
                first_seen: *first,
                last_seen: *last,
            })
        })
        .collect()
}

/// Method (a): operator_id shared across >=2 distinct drone_ids in the window.
fn by_shared_operator(
    rows: &[PatternRow],
    ranges: &HashMap<&str, (DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<PilotReuseFinding> {
    let mut by_operator: HashMap<&str, std::collections::HashSet<&str>> = HashMap::new();
    for row in rows {
        if let Some(op) = row.operator_id.as_deref() {
            if !op.is_empty() {
                by_operator.entry(op).or_default().insert(row.drone_id.as_str());
            }
        }
    }

    by_operator
        .into_iter()
        .filter(|(_, drones)| drones.len() >= 2)
        .map(|(operator_id, drones)| {
            let mut ids: Vec<&str> = drones.into_iter().collect();
            ids.sort();
            PilotReuseFinding {
                method: PilotReuseMethod::SharedOperator,
                shared_operator_id: Some(operator_id.to_string()),
                centroid_lat: None,
                centroid_lon: None,
                drone_ids: seen_range_entries(&ids, ranges),
            }
        })
        .collect()
}

/// Method (b): representative pilot position per drone, clustered by proximity.
fn by_pilot_proximity(
    rows: &[PatternRow],
    ranges: &HashMap<&str, (DateTime<Utc>, DateTime<Utc>)>,
    threshold_m: f64,
) -> Vec<PilotReuseFinding> {
    let mut sums: HashMap<&str, (f64, f64, u32)> = HashMap::new();
    for row in rows {
        if let (Some(lat), Some(lon)) = (row.pilot_lat, row.pilot_lon) {
            let entry = sums.entry(row.drone_id.as_str()).or_insert((0.0, 0.0, 0));
            entry.0 += lat;
            entry.1 += lon;
            entry.2 += 1;
        }
    }
    let positions: Vec<(&str, f64, f64)> = sums
        .into_iter()
        .map(|(drone_id, (lat_sum, lon_sum, n))| (drone_id, lat_sum / n as f64, lon_sum / n as f64))
        .collect();

    let mut parent: Vec<usize> = (0..positions.len()).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let d = calc_distance_m(positions[i].1, positions[i].2, positions[j].1, positions[j].2);
            if d <= threshold_m {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..positions.len() {
        clusters.entry(find(&mut parent, i)).or_default().push(i);
    }

    clusters
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| {
            let centroid_lat = members.iter().map(|&i| positions[i].1).sum::<f64>() / members.len() as f64;
            let centroid_lon = members.iter().map(|&i| positions[i].2).sum::<f64>() / members.len() as f64;
            let mut ids: Vec<&str> = members.iter().map(|&i| positions[i].0).collect();
            ids.sort();
            PilotReuseFinding {
                method: PilotReuseMethod::PilotProximity,
                shared_operator_id: None,
                centroid_lat: Some(centroid_lat),
                centroid_lon: Some(centroid_lon),
                drone_ids: seen_range_entries(&ids, ranges),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(drone_id: &str, operator: Option<&str>, pilot: Option<(f64, f64)>) -> PatternRow {
        PatternRow {
            time: Utc::now(),
            kit_id: "k1".to_string(),
            drone_id: drone_id.to_string(),
            lat: None,
            lon: None,
            alt: None,
            speed: None,
            rssi: None,
            operator_id: operator.map(String::from),
            pilot_lat: pilot.map(|p| p.0),
            pilot_lon: pilot.map(|p| p.1),
        }
    }

    #[test]
    fn shared_operator_requires_two_distinct_drones() {
        let rows = vec![
            row("d1", Some("op-1"), None),
            row("d2", Some("op-1"), None),
            row("d3", Some("op-2"), None),
        ];
        let ranges = seen_ranges_by_drone(&rows);
        let findings = by_shared_operator(&rows, &ranges);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].drone_ids.len(), 2);
    }

    #[test]
    fn pilot_proximity_clusters_within_threshold() {
        let rows = vec![
            row("d1", None, Some((37.0, -122.0))),
            row("d2", None, Some((37.0001, -122.0001))),
            row("d3", None, Some((38.0, -123.0))),
        ];
        let ranges = seen_ranges_by_drone(&rows);
        let findings = by_pilot_proximity(&rows, &ranges, 100.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].drone_ids.len(), 2);
    }
}
