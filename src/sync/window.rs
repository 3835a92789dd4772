//! Time window used when no resumption cursor is available.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};

use crate::config::SyncConfig;

/// Bounds of a window-mode fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    pub time_zone: String,
    /// Only items modified after this instant, when the overlap filter is enabled.
    pub updated_min: Option<DateTime<Utc>>,
}

impl SyncWindow {
    /// Compute the window for a pass starting at `now`.
    ///
    /// `updated_min` is only set when `use_updated_min` is enabled, a previous
    /// successful pass exists, and the caller allows it. Full-sync fallbacks
    /// pass `allow_updated_min = false` so nothing is filtered out.
    pub fn compute(
        config: &SyncConfig,
        last_synced_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        allow_updated_min: bool,
    ) -> Self {
        let time_min = config
            .start_date
            .map(midnight_utc)
            .unwrap_or_else(|| shift_days(now, config.lookback_days.saturating_neg()));

        let mut time_max = config
            .end_date
            .map(midnight_utc)
            .unwrap_or_else(|| shift_days(now, config.lookahead_days));
        if time_max <= time_min {
            time_max = shift_days(time_min, config.lookahead_days.max(1));
        }

        let updated_min = if config.use_updated_min && allow_updated_min {
            last_synced_at.map(|at| {
                TimeDelta::try_minutes(config.safety_overlap_minutes)
                    .and_then(|overlap| at.checked_sub_signed(overlap))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            })
        } else {
            None
        };

        Self {
            time_min,
            time_max,
            time_zone: config.time_zone.clone(),
            updated_min,
        }
    }

    pub fn time_min_param(&self) -> String {
        self.time_min.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn time_max_param(&self) -> String {
        self.time_max.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn updated_min_param(&self) -> Option<String> {
        self.updated_min
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Move `at` by `days`, saturating at the representable range.
fn shift_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let saturated = if days < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    TimeDelta::try_days(days)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(saturated)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn fixed_dates_resolve_to_midnight() {
        let config = SyncConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..SyncConfig::default()
        };
        let window = SyncWindow::compute(&config, None, now(), true);
        assert_eq!(window.time_min_param(), "2024-01-01T00:00:00Z");
        assert_eq!(window.time_max_param(), "2024-04-01T00:00:00Z");
        assert_eq!(window.time_zone, "UTC");
        assert!(window.updated_min.is_none());
    }

    #[test]
    fn relative_horizon_uses_lookback_and_lookahead() {
        let config = SyncConfig {
            lookback_days: 10,
            lookahead_days: 20,
            ..SyncConfig::default()
        };
        let window = SyncWindow::compute(&config, None, now(), true);
        assert_eq!(window.time_min, now() - Duration::days(10));
        assert_eq!(window.time_max, now() + Duration::days(20));
    }

    #[test]
    fn updated_min_applies_safety_overlap_when_enabled() {
        let config = SyncConfig {
            use_updated_min: true,
            safety_overlap_minutes: 5,
            ..SyncConfig::default()
        };
        let last = Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap();

        let window = SyncWindow::compute(&config, Some(last), now(), true);
        assert_eq!(
            window.updated_min_param().as_deref(),
            Some("2024-02-15T11:55:00Z")
        );

        let fallback = SyncWindow::compute(&config, Some(last), now(), false);
        assert!(fallback.updated_min.is_none());

        let disabled = SyncWindow::compute(&SyncConfig::default(), Some(last), now(), true);
        assert!(disabled.updated_min.is_none());
    }

    #[test]
    fn inverted_bounds_are_widened() {
        let config = SyncConfig {
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            lookahead_days: 30,
            ..SyncConfig::default()
        };
        let window = SyncWindow::compute(&config, None, now(), true);
        assert_eq!(window.time_max, window.time_min + Duration::days(30));
    }

    #[test]
    fn oversized_horizon_saturates_instead_of_panicking() {
        let config = SyncConfig {
            lookback_days: 200_000_000,
            lookahead_days: i64::MAX,
            use_updated_min: true,
            safety_overlap_minutes: i64::MAX,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let window = SyncWindow::compute(&config, Some(now()), now(), true);
        assert_eq!(window.time_min, DateTime::<Utc>::MIN_UTC);
        assert_eq!(window.time_max, DateTime::<Utc>::MAX_UTC);
        assert_eq!(window.updated_min, Some(DateTime::<Utc>::MIN_UTC));
    }
}
