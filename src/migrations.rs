use clickhouse::Client;

use crate::config::RetentionConfig;

/// Ordered list of DDL statements that bring up the observation schema. Every
/// statement is idempotent (`IF NOT EXISTS`), so it's safe to run on every startup —
/// same discipline as the teacher's `MIGRATIONS` array.
fn migrations(retention: &RetentionConfig, database: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),

        format!(
            r"CREATE TABLE IF NOT EXISTS drones
(
    `time`        DateTime64(6, 'UTC') CODEC(Delta, ZSTD(1)),
    `kit_id`      LowCardinality(String),
    `drone_id`    String,
    `lat`         Nullable(Float64),
    `lon`         Nullable(Float64),
    `alt`         Nullable(Float64),
    `speed`       Nullable(Float64),
    `heading`     Nullable(Float64),
    `pilot_lat`   Nullable(Float64),
    `pilot_lon`   Nullable(Float64),
    `home_lat`    Nullable(Float64),
    `home_lon`    Nullable(Float64),
    `mac`         Nullable(String),
    `rssi`        Nullable(Int32),
    `freq`        Nullable(Float64),
    `ua_type`     Nullable(String),
    `operator_id` Nullable(String),
    `caa_id`      Nullable(String),
    `rid_make`    Nullable(String),
    `rid_model`   Nullable(String),
    `rid_source`  Nullable(String),
    `track_type`  LowCardinality(String),
    `version`     UInt64 MATERIALIZED toUnixTimestamp64Micro(time),
    INDEX idx_rid_make rid_make TYPE bloom_filter(0.01) GRANULARITY 1,
    INDEX idx_operator_id operator_id TYPE bloom_filter(0.01) GRANULARITY 1,
    INDEX idx_track_type track_type TYPE minmax GRANULARITY 1
)
ENGINE = ReplacingMergeTree(version)
PARTITION BY toDate(time)
ORDER BY (kit_id, drone_id, time)
TTL toDateTime(time) + INTERVAL {} DAY DELETE
SETTINGS index_granularity = 8192",
            retention.drones_days
        ),

        // Secondary ordering for drone_id-first lookups; read by `patterns::fetch_window`.
        r"CREATE MATERIALIZED VIEW IF NOT EXISTS drones_by_drone_id
ENGINE = ReplacingMergeTree(version)
PARTITION BY toDate(time)
ORDER BY (drone_id, time)
AS SELECT *, toUnixTimestamp64Micro(time) AS version FROM drones".to_string(),

        format!(
            r"CREATE TABLE IF NOT EXISTS signals
(
    `time`            DateTime64(6, 'UTC') CODEC(Delta, ZSTD(1)),
    `kit_id`          LowCardinality(String),
    `freq_mhz`        Float64,
    `power_dbm`       Nullable(Float64),
    `bandwidth_mhz`   Nullable(Float64),
    `lat`             Nullable(Float64),
    `lon`             Nullable(Float64),
    `alt`             Nullable(Float64),
    `detection_type`  LowCardinality(String),
    `version`         UInt64 MATERIALIZED toUnixTimestamp64Micro(time)
)
ENGINE = ReplacingMergeTree(version)
PARTITION BY toDate(time)
ORDER BY (kit_id, freq_mhz, time)
TTL toDateTime(time) + INTERVAL {} DAY DELETE
SETTINGS index_granularity = 8192",
            retention.signals_days
        ),

        format!(
            r"CREATE TABLE IF NOT EXISTS system_health
(
    `time`             DateTime64(6, 'UTC') CODEC(Delta, ZSTD(1)),
    `kit_id`           LowCardinality(String),
    `gps_lat`          Nullable(Float64),
    `gps_lon`          Nullable(Float64),
    `gps_alt`          Nullable(Float64),
    `cpu_percent`      Nullable(Float64),
    `memory_percent`   Nullable(Float64),
    `disk_percent`     Nullable(Float64),
    `uptime_hours`     Nullable(Float64),
    `temp_cpu`         Nullable(Float64),
    `temp_gpu`         Nullable(Float64),
    `version`          UInt64 MATERIALIZED toUnixTimestamp64Micro(time)
)
ENGINE = ReplacingMergeTree(version)
PARTITION BY toDate(time)
ORDER BY (kit_id, time)
TTL toDateTime(time) + INTERVAL {} DAY DELETE
SETTINGS index_granularity = 8192",
            retention.system_health_days
        ),

        format!(
            r"CREATE TABLE IF NOT EXISTS drones_hourly
(
    `hour`           DateTime('UTC'),
    `kit_id`         LowCardinality(String),
    `unique_drones`  AggregateFunction(uniq, String),
    `altitude_sum`   SimpleAggregateFunction(sum, Float64),
    `altitude_count` SimpleAggregateFunction(sum, UInt64),
    `speed_sum`      SimpleAggregateFunction(sum, Float64),
    `speed_count`    SimpleAggregateFunction(sum, UInt64),
    `detections`     SimpleAggregateFunction(sum, UInt64)
)
ENGINE = AggregatingMergeTree
PARTITION BY toYYYYMM(hour)
ORDER BY (kit_id, hour)
TTL hour + INTERVAL {} DAY DELETE",
            retention.drones_hourly_days
        ),

        r"CREATE MATERIALIZED VIEW IF NOT EXISTS drones_hourly_mv
TO drones_hourly
AS SELECT
    toStartOfHour(time) AS hour,
    kit_id,
    uniqState(drone_id) AS unique_drones,
    sumSimpleState(coalesce(alt, 0.0)) AS altitude_sum,
    sumSimpleState(toUInt64(alt IS NOT NULL)) AS altitude_count,
    sumSimpleState(coalesce(speed, 0.0)) AS speed_sum,
    sumSimpleState(toUInt64(speed IS NOT NULL)) AS speed_count,
    sumSimpleState(toUInt64(1)) AS detections
FROM drones
GROUP BY hour, kit_id".to_string(),
    ]
}

/// Run all migrations against the configured ClickHouse database. `database` must
/// match the `Client`'s own `with_database` so unqualified table names in the DDL
/// above resolve into it. Safe to call on every startup.
pub async fn run(ch: &Client, retention: &RetentionConfig, database: &str) -> anyhow::Result<()> {
    for stmt in migrations(retention, database) {
        ch.query(&stmt).execute().await?;
    }
    tracing::info!("clickhouse schema migrations applied (database={database})");
    Ok(())
}
