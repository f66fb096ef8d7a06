use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived reachability state, computed from `last_seen` at read time — never stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitStatus {
    Online,
    Stale,
    Offline,
    Unknown,
}

impl KitStatus {
    /// online < 30s, stale < 120s, offline otherwise; unknown iff last_seen is absent.
    pub fn derive(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last_seen) = last_seen else {
            return KitStatus::Unknown;
        };
        let age = (now - last_seen).num_milliseconds().max(0) as f64 / 1000.0;
        if age < 30.0 {
            KitStatus::Online
        } else if age < 120.0 {
            KitStatus::Stale
        } else {
            KitStatus::Offline
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Kit {
    pub kit_id: String,
    pub name: String,
    pub location: Option<String>,
    pub api_url: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub status: KitStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddKitRequest {
    pub api_url: String,
    pub name: Option<String>,
    pub location: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct KitsQuery {
    pub kit_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KitsResponse {
    pub kits: Vec<Kit>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestKitRequest {
    pub api_url: Option<String>,
    pub kit_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub reachable: bool,
    pub round_trip_ms: u64,
    pub reported_kit_id: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_unknown_without_last_seen() {
        assert_eq!(KitStatus::derive(None, Utc::now()), KitStatus::Unknown);
    }

    #[test]
    fn status_online_under_30s() {
        let now = Utc::now();
        let last_seen = now - Duration::seconds(29);
        assert_eq!(KitStatus::derive(Some(last_seen), now), KitStatus::Online);
    }

    #[test]
    fn status_stale_between_30_and_120s() {
        let now = Utc::now();
        let last_seen = now - Duration::seconds(119);
        assert_eq!(KitStatus::derive(Some(last_seen), now), KitStatus::Stale);
    }

    #[test]
    fn status_offline_beyond_120s() {
        let now = Utc::now();
        let last_seen = now - Duration::seconds(121);
        assert_eq!(KitStatus::derive(Some(last_seen), now), KitStatus::Offline);
    }
}
