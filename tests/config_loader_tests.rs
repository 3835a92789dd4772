use calsync::config::{ConfigError, ConfigLoader};
use chrono::NaiveDate;
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    let keys: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("CALSYNC_"))
        .collect();
    for key in keys {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader_for(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.api_base, "https://www.googleapis.com/calendar/v3/");
    assert!(cfg.calendar_ids.is_empty());
    assert_eq!(cfg.sync.page_cap, 100);
    assert_eq!(cfg.sync.safety_overlap_minutes, 5);
    assert!(!cfg.sync.use_updated_min);
    assert!(cfg.sync.parallel_batches);
    assert_eq!(cfg.scheduler.min_interval_seconds, 60);
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "CALSYNC_SYNC_PAGE_CAP=10\n");
    write_env_file(&temp_dir, ".env.test", "CALSYNC_SYNC_PAGE_CAP=20\n");
    write_env_file(&temp_dir, ".env.test.local", "CALSYNC_SYNC_PAGE_CAP=30\n");

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "CALSYNC_PROFILE=test\nCALSYNC_SYNC_PAGE_CAP=15\nCALSYNC_ACCESS_TOKEN=layered-token\n",
    );

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.sync.page_cap, 30);
    assert_eq!(cfg.access_token.as_deref(), Some("layered-token"));
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "CALSYNC_CALENDAR_IDS=primary\nCALSYNC_SYNC_TIME_ZONE=Europe/Berlin\n",
    );

    unsafe {
        env::set_var("CALSYNC_CALENDAR_IDS", "primary, team@example.com=Team ,");
    }

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with env override");
    assert_eq!(
        cfg.calendar_ids,
        vec!["primary".to_string(), "team@example.com=Team".to_string()]
    );
    assert_eq!(cfg.sync.time_zone, "Europe/Berlin");

    clear_env();
}

#[test]
fn sync_window_and_patterns_are_parsed() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        concat!(
            "CALSYNC_SYNC_START_DATE=2024-01-01\n",
            "CALSYNC_SYNC_END_DATE=2024-04-01\n",
            "CALSYNC_SYNC_USE_UPDATED_MIN=yes\n",
            "CALSYNC_SYNC_PARALLEL_BATCHES=false\n",
            "CALSYNC_SYNC_EXCLUDE_PATTERNS='[\"^private\", \"lunch\"]'\n",
            "CALSYNC_API_BASE=http://localhost:9000/calendar/v3\n",
        ),
    );

    let cfg = loader_for(&temp_dir).load().expect("config loads");
    assert_eq!(cfg.sync.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert_eq!(cfg.sync.end_date, NaiveDate::from_ymd_opt(2024, 4, 1));
    assert!(cfg.sync.use_updated_min);
    assert!(!cfg.sync.parallel_batches);
    assert_eq!(cfg.sync.exclude_patterns, vec!["^private", "lunch"]);
    assert_eq!(cfg.api_base, "http://localhost:9000/calendar/v3/");

    clear_env();
}

#[test]
fn unparseable_number_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CALSYNC_RETRY_MAX_ATTEMPTS", "many");
    }

    let err = loader_for(&temp_dir).load().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref key, ref value }
            if key == "RETRY_MAX_ATTEMPTS" && value == "many"
    ));

    clear_env();
}

#[test]
fn out_of_range_batch_size_is_rejected() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CALSYNC_SYNC_BATCH_SIZE", "0");
    }

    let err = loader_for(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBatchSize { value: 0 }));

    clear_env();
}

#[test]
fn redacted_json_hides_access_token() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CALSYNC_ACCESS_TOKEN", "super-secret");
    }

    let cfg = loader_for(&temp_dir).load().expect("config loads");
    let json = cfg.redacted_json().expect("serializes");
    assert!(!json.contains("super-secret"));
    assert!(json.contains("[REDACTED]"));

    clear_env();
}

#[test]
fn oversized_horizons_and_intervals_are_rejected() {
    let _guard = env_guard();

    let cases = [
        ("CALSYNC_SYNC_LOOKBACK_DAYS", "200000000"),
        ("CALSYNC_SYNC_LOOKAHEAD_DAYS", "36501"),
        ("CALSYNC_SYNC_SAFETY_OVERLAP_MINUTES", "10081"),
        ("CALSYNC_SCHEDULER_MIN_INTERVAL_SECONDS", "18446744073709551615"),
    ];

    for (key, value) in cases {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        unsafe {
            env::set_var(key, value);
        }

        let err = loader_for(&temp_dir).load().unwrap_err();
        let matched = match key {
            "CALSYNC_SYNC_SAFETY_OVERLAP_MINUTES" => {
                matches!(err, ConfigError::InvalidSafetyOverlap { value: 10_081 })
            }
            "CALSYNC_SCHEDULER_MIN_INTERVAL_SECONDS" => {
                matches!(err, ConfigError::InvalidSchedulerMinInterval { value: u64::MAX })
            }
            _ => matches!(err, ConfigError::InvalidSyncHorizon { .. }),
        };
        assert!(matched, "{key}={value} produced {err:?}");
    }

    clear_env();
}

#[test]
fn horizon_at_upper_bound_is_accepted() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CALSYNC_SYNC_LOOKBACK_DAYS", "36500");
        env::set_var("CALSYNC_SCHEDULER_MIN_INTERVAL_SECONDS", "604800");
    }

    let cfg = loader_for(&temp_dir).load().expect("bounds are inclusive");
    assert_eq!(cfg.sync.lookback_days, 36_500);
    assert_eq!(cfg.scheduler.min_interval_seconds, 604_800);

    clear_env();
}
