use clickhouse::Client;

use crate::models::drone::DroneObservation;
use crate::models::health_sample::HealthSample;
use crate::models::signal::SignalObservation;

/// Batched upsert writer for the three observation tables. Follows the teacher's
/// `usage_tracker::flush` idiom: build one batched `INSERT ... VALUES (...), (...)`
/// string and execute it. Upsert semantics come from the tables' `ReplacingMergeTree`
/// engine — a re-inserted row with the same primary key is deduplicated by later merges
/// and by `FINAL`/`argMax` at read time, never by a conflict at write time.
#[derive(Clone)]
pub struct StorageWriter {
    ch: Client,
}

impl StorageWriter {
    pub fn new(ch: Client) -> Self {
        Self { ch }
    }

    pub async fn write_drones(&self, rows: &[DroneObservation]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let values: Vec<String> = rows.iter().map(drone_row_sql).collect();
        let sql = format!(
            "INSERT INTO drones \
             (time, kit_id, drone_id, lat, lon, alt, speed, heading, pilot_lat, pilot_lon, \
              home_lat, home_lon, mac, rssi, freq, ua_type, operator_id, caa_id, rid_make, \
              rid_model, rid_source, track_type) VALUES {}",
            values.join(", ")
        );
        self.ch.query(&sql).execute().await?;
        Ok(())
    }

    pub async fn write_signals(&self, rows: &[SignalObservation]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let values: Vec<String> = rows.iter().map(signal_row_sql).collect();
        let sql = format!(
            "INSERT INTO signals \
             (time, kit_id, freq_mhz, power_dbm, bandwidth_mhz, lat, lon, alt, detection_type) \
             VALUES {}",
            values.join(", ")
        );
        self.ch.query(&sql).execute().await?;
        Ok(())
    }

    pub async fn write_health(&self, rows: &[HealthSample]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let values: Vec<String> = rows.iter().map(health_row_sql).collect();
        let sql = format!(
            "INSERT INTO system_health \
             (time, kit_id, gps_lat, gps_lon, gps_alt, cpu_percent, memory_percent, \
              disk_percent, uptime_hours, temp_cpu, temp_gpu) VALUES {}",
            values.join(", ")
        );
        self.ch.query(&sql).execute().await?;
        Ok(())
    }

    pub fn client(&self) -> &Client {
        &self.ch
    }
}

fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "\\'"))
}

fn sql_opt_str(s: &Option<String>) -> String {
    match s {
        Some(v) => sql_str(v),
        None => "NULL".to_string(),
    }
}

fn sql_opt_num<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "NULL".to_string(),
    }
}

fn drone_row_sql(r: &DroneObservation) -> String {
    format!(
        "(parseDateTime64BestEffort('{}', 6), {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
        r.time.to_rfc3339(),
        sql_str(&r.kit_id),
        sql_str(&r.drone_id),
        sql_opt_num(&r.lat),
        sql_opt_num(&r.lon),
        sql_opt_num(&r.alt),
        sql_opt_num(&r.speed),
        sql_opt_num(&r.heading),
        sql_opt_num(&r.pilot_lat),
        sql_opt_num(&r.pilot_lon),
        sql_opt_num(&r.home_lat),
        sql_opt_num(&r.home_lon),
        sql_opt_str(&r.mac),
        sql_opt_num(&r.rssi),
        sql_opt_num(&r.freq),
        sql_opt_str(&r.ua_type),
        sql_opt_str(&r.operator_id),
        sql_opt_str(&r.caa_id),
        sql_opt_str(&r.rid_make),
        sql_opt_str(&r.rid_model),
        sql_opt_str(&r.rid_source),
        sql_str(&r.track_type),
    )
}

fn signal_row_sql(r: &SignalObservation) -> String {
    format!(
        "(parseDateTime64BestEffort('{}', 6), {}, {}, {}, {}, {}, {}, {}, {})",
        r.time.to_rfc3339(),
        sql_str(&r.kit_id),
        r.freq_mhz,
        sql_opt_num(&r.power_dbm),
        sql_opt_num(&r.bandwidth_mhz),
        sql_opt_num(&r.lat),
        sql_opt_num(&r.lon),
        sql_opt_num(&r.alt),
        sql_str(&r.detection_type),
    )
}

fn health_row_sql(r: &HealthSample) -> String {
    format!(
        "(parseDateTime64BestEffort('{}', 6), {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
        r.time.to_rfc3339(),
        sql_str(&r.kit_id),
        sql_opt_num(&r.gps_lat),
        sql_opt_num(&r.gps_lon),
        sql_opt_num(&r.gps_alt),
        sql_opt_num(&r.cpu_percent),
        sql_opt_num(&r.memory_percent),
        sql_opt_num(&r.disk_percent),
        sql_opt_num(&r.uptime_hours),
        sql_opt_num(&r.temp_cpu),
        sql_opt_num(&r.temp_gpu),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn drone_row_sql_escapes_quotes() {
        let row = DroneObservation {
            time: Utc::now(),
            kit_id: "k'1".to_string(),
            drone_id: "d1".to_string(),
            lat: Some(1.0),
            lon: None,
            alt: None,
            speed: None,
            heading: None,
            pilot_lat: None,
            pilot_lon: None,
            home_lat: None,
            home_lon: None,
            mac: None,
            rssi: None,
            freq: None,
            ua_type: None,
            operator_id: None,
            caa_id: None,
            rid_make: None,
            rid_model: None,
            rid_source: None,
            track_type: "drone".to_string(),
        };
        let sql = drone_row_sql(&row);
        assert!(sql.contains("k\\'1"));
        assert!(sql.contains("NULL"));
    }
}
