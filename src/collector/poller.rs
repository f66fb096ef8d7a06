use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};

use crate::collector::health::KitHealth;
use crate::collector::normalize::{normalize_drone, normalize_health, normalize_signal};
use crate::collector::upstream::{fetch_json_array, fetch_json_object};
use crate::config::CollectorConfig;
use crate::config_db::ConfigDb;
use crate::storage::StorageWriter;

/// One fast-cadence cycle: `/drones` and `/signals` requested concurrently (§4.3
/// "Endpoint fan-out"). A cycle is successful iff at least one of the two endpoints
/// produced usable data.
pub async fn poll_fast_cycle(
    kit_id: &str,
    base_url: &str,
    client: &reqwest::Client,
    config: &CollectorConfig,
    writer: &StorageWriter,
    health: &Arc<Mutex<KitHealth>>,
    registry: &ConfigDb,
    host_permits: &Arc<Semaphore>,
) {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let receive_instant = Utc::now();

    let drones_url = format!("{}/drones", base_url.trim_end_matches('/'));
    let signals_url = format!("{}/signals", base_url.trim_end_matches('/'));

    let (drones_res, signals_res) = tokio::join!(
        fetch_json_array(client, &drones_url, timeout, config.max_retries, host_permits),
        fetch_json_array(client, &signals_url, timeout, config.max_retries, host_permits),
    );

    let mut any_success = false;
    let mut drone_rows = Vec::new();
    match drones_res {
        Ok(items) => {
            any_success = true;
            for raw in &items {
                match normalize_drone(raw, kit_id, receive_instant) {
                    Some(row) => drone_rows.push(row),
                    None => tracing::warn!(kit_id, "skipped unparseable /drones row"),
                }
            }
        }
        Err(e) => {
            tracing::warn!(kit_id, error = %e, "poll /drones failed");
        }
    }

    let mut signal_rows = Vec::new();
    match signals_res {
        Ok(items) => {
            any_success = true;
            for raw in &items {
                match normalize_signal(raw, kit_id, receive_instant) {
                    Some(row) => signal_rows.push(row),
                    None => tracing::warn!(kit_id, "skipped unparseable /signals row"),
                }
            }
        }
        Err(e) => {
            tracing::warn!(kit_id, error = %e, "poll /signals failed");
        }
    }

    let mut write_ok = true;
    if let Err(e) = writer.write_drones(&drone_rows).await {
        tracing::error!(kit_id, error = %e, "failed to write drones batch");
        write_ok = false;
    }
    if let Err(e) = writer.write_signals(&signal_rows).await {
        tracing::error!(kit_id, error = %e, "failed to write signals batch");
        write_ok = false;
    }

    let mut h = health.lock().await;
    if any_success && write_ok {
        h.record_success(receive_instant);
        drop(h);
        if let Err(e) = registry.touch_last_seen(kit_id, receive_instant) {
            tracing::warn!(kit_id, error = %e, "failed to mirror last_seen to registry");
        }
    } else {
        h.record_failure("fast poll cycle failed", false);
    }
}

/// One slow-cadence cycle: `/status`, decoupled from the fast loop.
pub async fn poll_slow_cycle(
    kit_id: &str,
    base_url: &str,
    client: &reqwest::Client,
    config: &CollectorConfig,
    writer: &StorageWriter,
    health: &Arc<Mutex<KitHealth>>,
    host_permits: &Arc<Semaphore>,
) {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let receive_instant = Utc::now();
    let status_url = format!("{}/status", base_url.trim_end_matches('/'));

    match fetch_json_object(client, &status_url, timeout, config.max_retries, host_permits).await {
        Ok(raw) => {
            let sample = normalize_health(&raw, kit_id, receive_instant);
            if let Err(e) = writer.write_health(&[sample]).await {
                tracing::error!(kit_id, error = %e, "failed to write health sample");
            }
        }
        Err(e) => {
            let fatal = e.is_fatal();
            tracing::warn!(kit_id, error = %e, fatal, "poll /status failed");
            let mut h = health.lock().await;
            h.record_failure(e.to_string(), fatal);
        }
    }
}
