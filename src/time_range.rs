use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::errors::AppError;

const T_DEFAULT_HOURS: i64 = 1;
const MAX_WINDOW_HOURS: i64 = 168;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Parse one of `1h`, `24h`, `7d`, `custom:<ISO-start>,<ISO-end>`, or `None` (defaults
    /// to the last `T_default = 1h`). Caps the absolute window to 7 days (168h).
    pub fn parse(input: Option<&str>) -> Result<Self, AppError> {
        let now = Utc::now();
        let Some(input) = input else {
            return Ok(Self {
                start: now - Duration::hours(T_DEFAULT_HOURS),
                end: now,
            });
        };
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("custom:") {
            let (start_str, end_str) = rest.split_once(',').ok_or_else(|| {
                AppError::Validation(format!(
                    "invalid custom time_range '{input}': expected custom:<start>,<end>"
                ))
            })?;
            let start = DateTime::parse_from_rfc3339(start_str.trim())
                .map_err(|e| AppError::Validation(format!("invalid start timestamp: {e}")))?
                .with_timezone(&Utc);
            let end = DateTime::parse_from_rfc3339(end_str.trim())
                .map_err(|e| AppError::Validation(format!("invalid end timestamp: {e}")))?
                .with_timezone(&Utc);
            if start > end {
                return Err(AppError::Validation(
                    "custom time_range start must not be after end".to_string(),
                ));
            }
            if end - start > Duration::hours(MAX_WINDOW_HOURS) {
                return Err(AppError::Validation(format!(
                    "time_range window exceeds the {MAX_WINDOW_HOURS}h cap"
                )));
            }
            return Ok(Self { start, end });
        }

        let hours = if let Some(digits) = input.strip_suffix('h') {
            digits
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("invalid time_range '{input}'")))?
        } else if let Some(digits) = input.strip_suffix('d') {
            let days = digits
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("invalid time_range '{input}'")))?;
            days * 24
        } else {
            return Err(AppError::Validation(format!(
                "unrecognized time_range form '{input}'; expected 1h, 24h, 7d, or custom:<start>,<end>"
            )));
        };

        if hours <= 0 || hours > MAX_WINDOW_HOURS {
            return Err(AppError::Validation(format!(
                "time_range '{input}' must resolve to between 1h and {MAX_WINDOW_HOURS}h"
            )));
        }

        Ok(Self {
            start: now - Duration::hours(hours),
            end: now,
        })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_hour() {
        let tr = TimeRange::parse(None).unwrap();
        let span = tr.end - tr.start;
        assert_eq!(span.num_minutes(), 60);
    }

    #[test]
    fn parses_hours_and_days() {
        let tr = TimeRange::parse(Some("24h")).unwrap();
        assert_eq!((tr.end - tr.start).num_hours(), 24);

        let tr = TimeRange::parse(Some("7d")).unwrap();
        assert_eq!((tr.end - tr.start).num_hours(), 168);
    }

    #[test]
    fn rejects_unknown_form() {
        assert!(TimeRange::parse(Some("banana")).is_err());
    }

    #[test]
    fn rejects_window_over_cap() {
        assert!(TimeRange::parse(Some("169h")).is_err());
        assert!(TimeRange::parse(Some("8d")).is_err());
    }

    #[test]
    fn custom_range_round_trips() {
        let tr = TimeRange::parse(Some(
            "custom:2026-01-01T00:00:00Z,2026-01-01T12:00:00Z",
        ))
        .unwrap();
        assert_eq!((tr.end - tr.start).num_hours(), 12);
    }

    #[test]
    fn custom_range_rejects_inverted_bounds() {
        let err = TimeRange::parse(Some(
            "custom:2026-01-01T12:00:00Z,2026-01-01T00:00:00Z",
        ))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
