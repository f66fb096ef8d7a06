use crate::models::drone::DroneQuery;
use crate::models::signal::SignalQuery;
use crate::time_range::TimeRange;

/// WHERE-clause assembly idiom kept from the teacher's `resolve_field`/`format_value`
/// approach, but retargeted at the flat `drones`/`signals` columns instead of OTel's
/// dotted attribute keys — there's no nested-attribute extraction to do here.
pub fn time_bounds_clause(time_col: &str, range: &TimeRange) -> String {
    format!(
        "{time_col} >= parseDateTime64BestEffort('{}', 6) AND {time_col} <= parseDateTime64BestEffort('{}', 6)",
        range.start.to_rfc3339(),
        range.end.to_rfc3339(),
    )
}

pub fn build_drone_where(query: &DroneQuery, range: &TimeRange) -> String {
    let mut conditions = vec![time_bounds_clause("time", range)];

    if let Some(kit_ids) = &query.kit_id {
        conditions.push(format_in_list("kit_id", kit_ids));
    }
    if let Some(rid_make) = &query.rid_make {
        conditions.push(format!("rid_make = {}", format_value(rid_make)));
    }
    if let Some(track_type) = &query.track_type {
        conditions.push(format!("track_type = {}", format_value(track_type)));
    }

    conditions.join(" AND ")
}

pub fn build_signal_where(query: &SignalQuery, range: &TimeRange) -> String {
    let mut conditions = vec![time_bounds_clause("time", range)];

    if let Some(kit_ids) = &query.kit_id {
        conditions.push(format_in_list("kit_id", kit_ids));
    }
    if let Some(detection_type) = &query.detection_type {
        conditions.push(format!("detection_type = {}", format_value(detection_type)));
    }
    if let Some(min) = query.min_freq_mhz {
        conditions.push(format!("freq_mhz >= {min}"));
    }
    if let Some(max) = query.max_freq_mhz {
        conditions.push(format!("freq_mhz <= {max}"));
    }

    conditions.join(" AND ")
}

/// Comma-separated filter values rendered as a ClickHouse `IN (...)` list.
fn format_in_list(column: &str, csv: &str) -> String {
    let items: Vec<String> = csv
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(format_value)
        .collect();
    if items.is_empty() {
        "1".to_string()
    } else {
        format!("{column} IN ({})", items.join(", "))
    }
}

pub fn format_value(s: &str) -> String {
    format!("'{}'", s.replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drone::DroneQuery;

    #[test]
    fn kit_id_csv_becomes_in_list() {
        let clause = format_in_list("kit_id", "a, b,c");
        assert_eq!(clause, "kit_id IN ('a', 'b', 'c')");
    }

    #[test]
    fn drone_where_includes_time_bounds_and_filters() {
        let range = TimeRange::parse(Some("1h")).unwrap();
        let query = DroneQuery {
            time_range: Some("1h".to_string()),
            kit_id: Some("kit-1".to_string()),
            rid_make: Some("DJI".to_string()),
            track_type: None,
            limit: None,
        };
        let clause = build_drone_where(&query, &range);
        assert!(clause.contains("kit_id IN ('kit-1')"));
        assert!(clause.contains("rid_make = 'DJI'"));
    }
}
