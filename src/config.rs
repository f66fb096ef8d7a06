use serde::Deserialize;
use std::path::Path;

/// Top-level config loaded from `KITS_CONFIG` (a TOML file, default `./kits.toml`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub kits: Vec<KitSeed>,
}

/// An initial kit entry merged into the registry on startup (§4.2 `reload_from_config`).
#[derive(Debug, Clone, Deserialize)]
pub struct KitSeed {
    pub kit_id: Option<String>,
    pub api_url: String,
    pub name: Option<String>,
    pub location: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_poll_fast_secs")]
    pub poll_interval_fast_secs: u64,
    #[serde(default = "default_poll_slow_secs")]
    pub poll_interval_status_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,
    #[serde(default = "default_max_concurrent_requests_per_kit")]
    pub max_concurrent_requests_per_kit: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_fast_secs: default_poll_fast_secs(),
            poll_interval_status_secs: default_poll_slow_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            max_backoff_secs: default_max_backoff_secs(),
            stale_threshold_secs: default_stale_threshold_secs(),
            max_concurrent_requests_per_kit: default_max_concurrent_requests_per_kit(),
        }
    }
}

fn default_poll_fast_secs() -> u64 {
    5
}
fn default_poll_slow_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_backoff_secs() -> u64 {
    300
}
fn default_stale_threshold_secs() -> u64 {
    60
}
fn default_max_concurrent_requests_per_kit() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_drones_days")]
    pub drones_days: u32,
    #[serde(default = "default_drones_days")]
    pub signals_days: u32,
    #[serde(default = "default_health_days")]
    pub system_health_days: u32,
    #[serde(default = "default_hourly_days")]
    pub drones_hourly_days: u32,
    #[serde(default)]
    pub enforcer: EnforcerConfig,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            drones_days: default_drones_days(),
            signals_days: default_drones_days(),
            system_health_days: default_health_days(),
            drones_hourly_days: default_hourly_days(),
            enforcer: EnforcerConfig::default(),
        }
    }
}

fn default_drones_days() -> u32 {
    30
}
fn default_health_days() -> u32 {
    90
}
fn default_hourly_days() -> u32 {
    365
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnforcerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_enforcer_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_enforcer_interval(),
            dry_run: false,
        }
    }
}

fn default_enforcer_interval() -> u64 {
    3600
}

impl AggregatorConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist,
    /// matching the teacher's `WideConfig::load` fallback-to-defaults behavior.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: AggregatorConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }
}
