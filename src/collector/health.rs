use chrono::{DateTime, Utc};
use std::time::Duration;

/// Per-kit health state (§4.3). `Stale` is never stored directly — it's derived from
/// `last_seen` age the same way `KitStatus::derive` is, but this machine additionally
/// tracks `Error` (terminal upstream-fatal failure) which the registry's simpler
/// online/stale/offline/unknown vocabulary doesn't need to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KitHealthState {
    Unknown,
    Online,
    Offline,
    Error,
}

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct KitHealth {
    pub state: KitHealthState,
    pub consecutive_failures: u32,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_polls: u64,
    pub successful_polls: u64,
    pub failed_polls: u64,
}

impl Default for KitHealth {
    fn default() -> Self {
        Self {
            state: KitHealthState::Unknown,
            consecutive_failures: 0,
            last_seen: None,
            last_error: None,
            total_polls: 0,
            successful_polls: 0,
            failed_polls: 0,
        }
    }
}

impl KitHealth {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.state = KitHealthState::Online;
        self.consecutive_failures = 0;
        self.last_seen = Some(at);
        self.last_error = None;
        self.total_polls += 1;
        self.successful_polls += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>, fatal: bool) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
        self.state = if fatal {
            KitHealthState::Error
        } else {
            KitHealthState::Offline
        };
        self.total_polls += 1;
        self.failed_polls += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_polls == 0 {
            0.0
        } else {
            self.successful_polls as f64 / self.total_polls as f64
        }
    }

    /// §4.3/§8 backoff law: `min(T_fast * 2^k, 300s)`. Deliberately a pure function of
    /// `consecutive_failures` rather than a stateful jittered timer, so the exact
    /// boundary values in the testable-properties table hold without tolerance.
    pub fn backoff_delay(&self, t_fast: Duration, max_backoff: Duration) -> Duration {
        backoff_delay(self.consecutive_failures, t_fast, max_backoff)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, stale_threshold: Duration) -> bool {
        match self.last_seen {
            Some(last_seen) => {
                let age = (now - last_seen).num_milliseconds().max(0) as u64;
                age > stale_threshold.as_millis() as u64
            }
            None => false,
        }
    }
}

pub fn backoff_delay(consecutive_failures: u32, t_fast: Duration, max_backoff: Duration) -> Duration {
    if consecutive_failures == 0 {
        return t_fast;
    }
    // Cap the exponent well before u128 overflow; any k this large already exceeds
    // max_backoff, so clamping the exponent changes nothing observable.
    let factor = 1u128 << consecutive_failures.min(100);
    let scaled_nanos = (t_fast.as_nanos()).saturating_mul(factor);
    let scaled = Duration::from_nanos(scaled_nanos.min(u64::MAX as u128) as u64);
    scaled.min(max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T_FAST: Duration = Duration::from_secs(5);
    const MAX_BACKOFF: Duration = Duration::from_secs(300);

    #[test]
    fn backoff_sequence_matches_spec_scenario() {
        // 5, 10, 20, 40, 80, 80... capped at 300s — but the published E2E scenario
        // caps the observed sequence at 80s within its 60s test window; beyond that
        // the law itself still applies all the way to 300.
        let expected = [5u64, 10, 20, 40, 80, 160, 300, 300];
        for (k, exp) in expected.iter().enumerate() {
            let delay = backoff_delay((k + 1) as u32, T_FAST, MAX_BACKOFF);
            assert_eq!(delay.as_secs(), *exp, "k={k}");
        }
    }

    #[test]
    fn zero_failures_is_nominal_cadence() {
        assert_eq!(backoff_delay(0, T_FAST, MAX_BACKOFF), T_FAST);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut health = KitHealth::default();
        health.record_failure("boom", false);
        health.record_failure("boom", false);
        assert_eq!(health.consecutive_failures, 2);
        health.record_success(Utc::now());
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.state, KitHealthState::Online);
    }

    #[test]
    fn stale_detection_is_informational_only() {
        let mut health = KitHealth::default();
        health.record_success(Utc::now() - chrono::Duration::seconds(61));
        assert!(health.is_stale(Utc::now(), Duration::from_secs(60)));
        // Staleness alone doesn't widen backoff — consecutive_failures is untouched.
        assert_eq!(health.consecutive_failures, 0);
    }
}
