use clickhouse::Client;
use std::time::Duration;

use crate::config::RetentionConfig;

/// Background task that re-asserts retention independently of each table's `TTL`
/// clause (§4.1/§4.3). The `TTL` already reclaims space on ClickHouse's own merge
/// schedule; this enforcer issues an explicit `ALTER TABLE ... DELETE` on a fixed
/// interval so retention is observable on a bounded clock rather than "eventually,
/// whenever a merge happens to run."
pub fn spawn_retention_enforcer(ch: Client, config: RetentionConfig) {
    if !config.enforcer.enabled {
        tracing::info!("retention enforcer: disabled by config");
        return;
    }

    let interval_secs = config.enforcer.interval_secs;
    let dry_run = config.enforcer.dry_run;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        tracing::info!("retention enforcer: started (interval={interval_secs}s, dry_run={dry_run})");

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = enforce_retention(&ch, &config).await {
                tracing::error!("retention enforcer error: {e}");
            }
        }
    });
}

async fn enforce_retention(ch: &Client, config: &RetentionConfig) -> anyhow::Result<()> {
    let dry_run = config.enforcer.dry_run;

    delete_older_than(ch, "drones", "time", config.drones_days, dry_run).await;
    delete_older_than(ch, "signals", "time", config.signals_days, dry_run).await;
    delete_older_than(ch, "system_health", "time", config.system_health_days, dry_run).await;
    delete_older_than(ch, "drones_hourly", "hour", config.drones_hourly_days, dry_run).await;

    Ok(())
}

async fn delete_older_than(ch: &Client, table: &str, time_col: &str, retain_days: u32, dry_run: bool) {
    let sql =
        format!("ALTER TABLE {table} DELETE WHERE {time_col} < now() - INTERVAL {retain_days} DAY");
    if dry_run {
        tracing::info!("retention enforcer (dry run): {sql}");
        return;
    }
    if let Err(e) = ch.query(&sql).execute().await {
        tracing::error!(table, error = %e, "retention enforcer: delete failed");
    }
}
