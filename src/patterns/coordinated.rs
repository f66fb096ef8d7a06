use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use clickhouse::Client;

use crate::errors::AppError;
use crate::models::pattern::{CoordinatedFinding, PatternResponse, Severity};
use crate::patterns::{fetch_window, PatternRow};
use crate::spatial::calc_distance_m;

pub struct Params {
    pub time_window_minutes: i64,
    pub distance_threshold_m: f64,
}

impl Params {
    pub fn parse(
        time_window_minutes: Option<i64>,
        distance_threshold_m: Option<f64>,
    ) -> Result<Self, AppError> {
        let time_window_minutes = time_window_minutes.unwrap_or(60);
        if !(1..=1440).contains(&time_window_minutes) {
            return Err(AppError::Validation(
                "time_window_minutes must be between 1 and 1440".to_string(),
            ));
        }
        let distance_threshold_m = distance_threshold_m.unwrap_or(200.0);
        if distance_threshold_m < 10.0 {
            return Err(AppError::Validation(
                "distance_threshold_m must be at least 10".to_string(),
            ));
        }
        Ok(Self {
            time_window_minutes,
            distance_threshold_m,
        })
    }
}

struct Point<'a> {
    bucket_minutes: i64,
    lat: f64,
    lon: f64,
    drone_id: &'a str,
    time: DateTime<Utc>,
}

/// Density-based clustering in time and space: points land in the same cluster iff
/// their 1-minute time buckets are equal or adjacent AND their great-circle distance
/// is within threshold. Implemented as union-find over the pairwise adjacency graph.
pub async fn find(ch: &Client, params: &Params) -> Result<PatternResponse<CoordinatedFinding>, AppError> {
    let since = Utc::now() - Duration::minutes(params.time_window_minutes);
    let where_clause = format!(
        "time >= parseDateTime64BestEffort('{}', 6)",
        since.to_rfc3339()
    );
    let rows = fetch_window(ch, &where_clause).await?;

    let points: Vec<Point> = rows
        .iter()
        .filter_map(|r| {
            let (lat, lon) = (r.lat?, r.lon?);
            Some(Point {
                bucket_minutes: r.time.timestamp() / 60,
                lat,
                lon,
                drone_id: r.drone_id.as_str(),
                time: r.time,
            })
        })
        .collect();

    let mut uf = UnionFind::new(points.len());
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let adjacent_buckets = (points[i].bucket_minutes - points[j].bucket_minutes).abs() <= 1;
            if !adjacent_buckets {
                continue;
            }
            let dist = calc_distance_m(points[i].lat, points[i].lon, points[j].lat, points[j].lon);
            if dist <= params.distance_threshold_m {
                uf.union(i, j);
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..points.len() {
        clusters.entry(uf.find(i)).or_default().push(i);
    }

    let mut findings = Vec::new();
    for members in clusters.values() {
        let distinct: HashSet<&str> = members.iter().map(|&i| points[i].drone_id).collect();
        if distinct.len() < 2 {
            continue;
        }
        let cluster_time = members.iter().map(|&i| points[i].time).min().unwrap();
        let centroid_lat = members.iter().map(|&i| points[i].lat).sum::<f64>() / members.len() as f64;
        let centroid_lon = members.iter().map(|&i| points[i].lon).sum::<f64>() / members.len() as f64;
        let score = match distinct.len() {
            n if n >= 5 => Severity::High,
            3 | 4 => Severity::Medium,
            _ => Severity::Low,
        };
        let mut drone_ids: Vec<String> = distinct.into_iter().map(String::from).collect();
        drone_ids.sort();
        findings.push(CoordinatedFinding {
            cluster_time,
            centroid_lat,
            centroid_lon,
            drone_ids,
            score,
        });
    }

    findings.sort_by(|a, b| b.score.cmp(&a.score).then(a.cluster_time.cmp(&b.cluster_time)));
    findings.truncate(1000);

    let count = findings.len();
    Ok(PatternResponse { findings, count })
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_enforces_bounds() {
        assert!(Params::parse(Some(0), Some(200.0)).is_err());
        assert!(Params::parse(Some(60), Some(5.0)).is_err());
        assert!(Params::parse(Some(1441), Some(200.0)).is_ok() == false);
    }

    #[test]
    fn severity_bands_match_distinct_drone_count() {
        assert_eq!(
            match 5usize {
                n if n >= 5 => Severity::High,
                3 | 4 => Severity::Medium,
                _ => Severity::Low,
            },
            Severity::High
        );
        assert_eq!(
            match 3usize {
                n if n >= 5 => Severity::High,
                3 | 4 => Severity::Medium,
                _ => Severity::Low,
            },
            Severity::Medium
        );
        assert_eq!(
            match 2usize {
                n if n >= 5 => Severity::High,
                3 | 4 => Severity::Medium,
                _ => Severity::Low,
            },
            Severity::Low
        );
    }
}
