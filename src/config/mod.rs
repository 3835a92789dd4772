//! Configuration loading for the calendar sync engine.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `CALSYNC_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ENV_PREFIX: &str = "CALSYNC_";

/// Application configuration derived from `CALSYNC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Base URL of the remote calendar API (must end with `/`).
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// File holding the bearer token; re-read after the provider rejects it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_file: Option<PathBuf>,
    /// Calendars to synchronize, as `id` or `id=Display Name` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calendar_ids: Vec<String>,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub retry: RetryPolicyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Knobs controlling a single synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Fixed lower bound of the sync window; overrides `lookback_days`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Fixed upper bound of the sync window; overrides `lookahead_days`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_sync_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_sync_lookahead_days")]
    pub lookahead_days: i64,
    #[serde(default = "default_sync_time_zone")]
    pub time_zone: String,
    /// Minutes subtracted from the last successful sync when computing `updatedMin`.
    #[serde(default = "default_sync_safety_overlap_minutes")]
    pub safety_overlap_minutes: i64,
    #[serde(default)]
    pub use_updated_min: bool,
    #[serde(default = "default_sync_page_cap")]
    pub page_cap: usize,
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_sync_detail_limit")]
    pub detail_limit: usize,
    #[serde(default = "default_true")]
    pub parallel_batches: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
}

/// Retry policy applied to every remote page fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RetryPolicyConfig {
    /// Total attempts including the first call (default: 4)
    ///
    /// Environment variable: `CALSYNC_RETRY_MAX_ATTEMPTS`
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Backoff for the first retry in milliseconds (default: 500)
    ///
    /// Subsequent retries double this value up to `max_delay_ms`.
    ///
    /// Environment variable: `CALSYNC_RETRY_BASE_DELAY_MS`
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for the exponential backoff in milliseconds (default: 10000)
    ///
    /// Environment variable: `CALSYNC_RETRY_MAX_DELAY_MS`
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor applied as `delay * (1 +/- jitter)` (default: 0.2, range: 0.0-1.0)
    ///
    /// Environment variable: `CALSYNC_RETRY_JITTER`
    #[serde(default = "default_retry_jitter")]
    pub jitter: f64,
}

/// Scheduler-specific configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    /// Minimum spacing between two runs, persisted across restarts.
    #[serde(default = "default_scheduler_min_interval_seconds")]
    pub min_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            api_base: default_api_base(),
            access_token: None,
            access_token_file: None,
            calendar_ids: Vec::new(),
            http_timeout_seconds: default_http_timeout_seconds(),
            sync: SyncConfig::default(),
            retry: RetryPolicyConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            lookback_days: default_sync_lookback_days(),
            lookahead_days: default_sync_lookahead_days(),
            time_zone: default_sync_time_zone(),
            safety_overlap_minutes: default_sync_safety_overlap_minutes(),
            use_updated_min: false,
            page_cap: default_sync_page_cap(),
            batch_size: default_sync_batch_size(),
            detail_limit: default_sync_detail_limit(),
            parallel_batches: true,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
            jitter: default_retry_jitter(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_scheduler_tick_interval_seconds(),
            min_interval_seconds: default_scheduler_min_interval_seconds(),
        }
    }
}

impl AppConfig {
    /// Returns the parsed remote API base URL.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_base).map_err(|source| ConfigError::InvalidApiBase {
            value: self.api_base.clone(),
            source,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.access_token.is_some() {
            config.access_token = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error on out-of-range settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        self.api_base_url()?;

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_seconds,
            });
        }

        if let Some(entry) = self
            .calendar_ids
            .iter()
            .find(|entry| entry.split('=').next().unwrap_or("").trim().is_empty())
        {
            return Err(ConfigError::InvalidCalendarEntry {
                entry: entry.clone(),
            });
        }

        self.sync.validate()?;
        self.retry.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

/// Upper bound for the relative sync horizon in either direction.
pub const MAX_HORIZON_DAYS: i64 = 36_500;
pub const MAX_SAFETY_OVERLAP_MINUTES: i64 = 10_080;
pub const MAX_MIN_INTERVAL_SECONDS: u64 = 604_800;

impl SyncConfig {
    /// Validate sync window and batching bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start >= end
        {
            return Err(ConfigError::InvalidSyncWindow { start, end });
        }

        if !(0..=MAX_HORIZON_DAYS).contains(&self.lookback_days)
            || !(0..=MAX_HORIZON_DAYS).contains(&self.lookahead_days)
        {
            return Err(ConfigError::InvalidSyncHorizon {
                lookback: self.lookback_days,
                lookahead: self.lookahead_days,
            });
        }

        if self.time_zone.trim().is_empty() {
            return Err(ConfigError::MissingSyncTimeZone);
        }

        if !(0..=MAX_SAFETY_OVERLAP_MINUTES).contains(&self.safety_overlap_minutes) {
            return Err(ConfigError::InvalidSafetyOverlap {
                value: self.safety_overlap_minutes,
            });
        }

        if self.page_cap == 0 {
            return Err(ConfigError::InvalidPageCap);
        }

        if self.batch_size == 0 || self.batch_size > 500 {
            return Err(ConfigError::InvalidBatchSize {
                value: self.batch_size,
            });
        }

        Ok(())
    }
}

impl RetryPolicyConfig {
    /// Validate retry policy bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts);
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidRetryBounds {
                base: self.base_delay_ms,
                max: self.max_delay_ms,
            });
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidRetryJitter { value: self.jitter });
        }

        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_seconds == 0 || self.tick_interval_seconds > 86_400 {
            return Err(ConfigError::InvalidSchedulerTickInterval {
                value: self.tick_interval_seconds,
            });
        }

        if self.min_interval_seconds > MAX_MIN_INTERVAL_SECONDS {
            return Err(ConfigError::InvalidSchedulerMinInterval {
                value: self.min_interval_seconds,
            });
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://calsync.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_api_base() -> String {
    "https://www.googleapis.com/calendar/v3/".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_sync_lookback_days() -> i64 {
    90
}

fn default_sync_lookahead_days() -> i64 {
    365
}

fn default_sync_time_zone() -> String {
    "UTC".to_string()
}

fn default_sync_safety_overlap_minutes() -> i64 {
    5
}

fn default_sync_page_cap() -> usize {
    100
}

fn default_sync_batch_size() -> usize {
    50
}

fn default_sync_detail_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_retry_max_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_retry_jitter() -> f64 {
    0.2
}

fn default_scheduler_tick_interval_seconds() -> u64 {
    300
}

fn default_scheduler_min_interval_seconds() -> u64 {
    60
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid value for CALSYNC_{key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("database url is missing; set CALSYNC_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("invalid api base '{value}': {source}")]
    InvalidApiBase {
        value: String,
        source: url::ParseError,
    },
    #[error("http timeout must be positive, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("invalid calendar entry '{entry}'; expected 'id' or 'id=Display Name'")]
    InvalidCalendarEntry { entry: String },
    #[error("sync start date ({start}) must be before end date ({end})")]
    InvalidSyncWindow { start: NaiveDate, end: NaiveDate },
    #[error(
        "sync lookback ({lookback}) and lookahead ({lookahead}) days must be between 0 and 36500"
    )]
    InvalidSyncHorizon { lookback: i64, lookahead: i64 },
    #[error("sync time zone is empty; set CALSYNC_SYNC_TIME_ZONE")]
    MissingSyncTimeZone,
    #[error("sync safety overlap must be between 0 and 10080 minutes, got {value}")]
    InvalidSafetyOverlap { value: i64 },
    #[error("sync page cap must be at least 1")]
    InvalidPageCap,
    #[error("sync batch size must be between 1 and 500, got {value}")]
    InvalidBatchSize { value: usize },
    #[error("retry max attempts must be at least 1")]
    InvalidRetryAttempts,
    #[error("retry base delay ({base}ms) cannot be greater than max delay ({max}ms)")]
    InvalidRetryBounds { base: u64, max: u64 },
    #[error("retry jitter must be between 0.0 and 1.0, got {value}")]
    InvalidRetryJitter { value: f64 },
    #[error("scheduler tick interval must be between 1 and 86400 seconds, got {value}")]
    InvalidSchedulerTickInterval { value: u64 },
    #[error("scheduler min interval must be at most 604800 seconds, got {value}")]
    InvalidSchedulerMinInterval { value: u64 },
}

/// Splits a pattern list given either as a JSON array of strings or as
/// newline-separated text. Blank entries are dropped.
pub fn parse_pattern_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[')
        && let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed)
    {
        return values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }

    trimmed
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Loads configuration using layered `.env` files and `CALSYNC_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let api_base = take_string(&mut layered, "API_BASE")
            .map(|base| {
                if base.ends_with('/') {
                    base
                } else {
                    format!("{base}/")
                }
            })
            .unwrap_or_else(default_api_base);
        let access_token = take_string(&mut layered, "ACCESS_TOKEN");
        let access_token_file = take_string(&mut layered, "ACCESS_TOKEN_FILE").map(PathBuf::from);
        let calendar_ids = take_string(&mut layered, "CALENDAR_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let http_timeout_seconds = take_parsed(&mut layered, "HTTP_TIMEOUT_SECONDS")?
            .unwrap_or_else(default_http_timeout_seconds);

        let sync = SyncConfig {
            start_date: take_parsed(&mut layered, "SYNC_START_DATE")?,
            end_date: take_parsed(&mut layered, "SYNC_END_DATE")?,
            lookback_days: take_parsed(&mut layered, "SYNC_LOOKBACK_DAYS")?
                .unwrap_or_else(default_sync_lookback_days),
            lookahead_days: take_parsed(&mut layered, "SYNC_LOOKAHEAD_DAYS")?
                .unwrap_or_else(default_sync_lookahead_days),
            time_zone: take_string(&mut layered, "SYNC_TIME_ZONE")
                .unwrap_or_else(default_sync_time_zone),
            safety_overlap_minutes: take_parsed(&mut layered, "SYNC_SAFETY_OVERLAP_MINUTES")?
                .unwrap_or_else(default_sync_safety_overlap_minutes),
            use_updated_min: take_bool(&mut layered, "SYNC_USE_UPDATED_MIN")?.unwrap_or(false),
            page_cap: take_parsed(&mut layered, "SYNC_PAGE_CAP")?
                .unwrap_or_else(default_sync_page_cap),
            batch_size: take_parsed(&mut layered, "SYNC_BATCH_SIZE")?
                .unwrap_or_else(default_sync_batch_size),
            detail_limit: take_parsed(&mut layered, "SYNC_DETAIL_LIMIT")?
                .unwrap_or_else(default_sync_detail_limit),
            parallel_batches: take_bool(&mut layered, "SYNC_PARALLEL_BATCHES")?.unwrap_or(true),
            exclude_patterns: take_string(&mut layered, "SYNC_EXCLUDE_PATTERNS")
                .map(|raw| parse_pattern_list(&raw))
                .unwrap_or_default(),
        };

        let retry = RetryPolicyConfig {
            max_attempts: take_parsed(&mut layered, "RETRY_MAX_ATTEMPTS")?
                .unwrap_or_else(default_retry_max_attempts),
            base_delay_ms: take_parsed(&mut layered, "RETRY_BASE_DELAY_MS")?
                .unwrap_or_else(default_retry_base_delay_ms),
            max_delay_ms: take_parsed(&mut layered, "RETRY_MAX_DELAY_MS")?
                .unwrap_or_else(default_retry_max_delay_ms),
            jitter: take_parsed(&mut layered, "RETRY_JITTER")?
                .unwrap_or_else(default_retry_jitter),
        };

        let scheduler = SchedulerConfig {
            tick_interval_seconds: take_parsed(&mut layered, "SCHEDULER_TICK_INTERVAL_SECONDS")?
                .unwrap_or_else(default_scheduler_tick_interval_seconds),
            min_interval_seconds: take_parsed(&mut layered, "SCHEDULER_MIN_INTERVAL_SECONDS")?
                .unwrap_or_else(default_scheduler_min_interval_seconds),
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            api_base,
            access_token,
            access_token_file,
            calendar_ids,
            http_timeout_seconds,
            sync,
            retry,
            scheduler,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn take_bool(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<bool>, ConfigError> {
    match take_string(layered, key) {
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.page_cap, 100);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_retry_policy_validation() {
        let valid = RetryPolicyConfig::default();
        assert!(valid.validate().is_ok());

        let inverted = RetryPolicyConfig {
            base_delay_ms: 20_000,
            max_delay_ms: 10_000,
            ..RetryPolicyConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidRetryBounds { .. })
        ));

        let bad_jitter = RetryPolicyConfig {
            jitter: 1.5,
            ..RetryPolicyConfig::default()
        };
        assert!(matches!(
            bad_jitter.validate(),
            Err(ConfigError::InvalidRetryJitter { .. })
        ));
    }

    #[test]
    fn sync_window_bounds_are_checked() {
        let config = SyncConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSyncWindow { .. })
        ));

        let zero_batch = SyncConfig {
            batch_size: 0,
            ..SyncConfig::default()
        };
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn redacted_json_hides_access_token() {
        let config = AppConfig {
            access_token: Some("secret-token".to_string()),
            ..AppConfig::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn pattern_list_accepts_json_and_lines() {
        assert_eq!(
            parse_pattern_list(r#"["^lunch", "  ", "standup"]"#),
            vec!["^lunch".to_string(), "standup".to_string()]
        );
        assert_eq!(
            parse_pattern_list("a{1,3}\n\n  private  \n"),
            vec!["a{1,3}".to_string(), "private".to_string()]
        );
    }

    #[test]
    fn empty_calendar_id_is_rejected() {
        let config = AppConfig {
            calendar_ids: vec!["=Team".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCalendarEntry { .. })
        ));
    }
}
