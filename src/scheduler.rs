//! # Sync Scheduler
//!
//! Periodically triggers sync runs. The scheduler owns the [`RunGuard`]: an
//! in-memory `running` flag that prevents overlapping runs, and the time of
//! the last run, which is also persisted in the settings table so a restart
//! still honours the minimum interval between runs.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, histogram};
use serde_json::Value as JsonValue;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::models::app_setting::LAST_RUN_AT_KEY;
use crate::sync::{CalendarTarget, RunSummary, SyncOrchestrator};

/// Run bookkeeping owned by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunGuard {
    pub last_run_at: Option<DateTime<Utc>>,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Run,
    AlreadyRunning,
    TooSoon { next_allowed_at: DateTime<Utc> },
}

impl RunGuard {
    /// Decide whether a run may start at `now`, taking the persisted last run into account.
    pub fn check(
        &self,
        now: DateTime<Utc>,
        persisted_last_run: Option<DateTime<Utc>>,
        min_interval: Duration,
    ) -> TriggerDecision {
        if self.running {
            return TriggerDecision::AlreadyRunning;
        }

        let last = match (self.last_run_at, persisted_last_run) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        match last {
            Some(last) => {
                let next_allowed_at = last
                    .checked_add_signed(min_interval)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                if now < next_allowed_at {
                    TriggerDecision::TooSoon { next_allowed_at }
                } else {
                    TriggerDecision::Run
                }
            }
            None => TriggerDecision::Run,
        }
    }
}

/// Background scheduler service.
pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    targets: Vec<CalendarTarget>,
    config: SchedulerConfig,
    guard: Mutex<RunGuard>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        targets: Vec<CalendarTarget>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            orchestrator,
            targets,
            config,
            guard: Mutex::new(RunGuard::default()),
        }
    }

    /// Snapshot of the current guard state.
    pub fn guard_state(&self) -> RunGuard {
        lock(&self.guard).clone()
    }

    fn min_interval(&self) -> Duration {
        i64::try_from(self.config.min_interval_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    async fn persisted_last_run(&self) -> Option<DateTime<Utc>> {
        match self.orchestrator.store().get_setting(LAST_RUN_AT_KEY).await {
            Ok(Some(JsonValue::String(value))) => DateTime::parse_from_rfc3339(&value)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|err| warn!(value, error = %err, "Ignoring unparseable last run marker"))
                .ok(),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "Failed to read last run marker");
                None
            }
        }
    }

    /// Start a run unless one is in progress or the minimum interval has not elapsed.
    ///
    /// Returns `None` when the run was skipped.
    pub async fn trigger(&self) -> Option<RunSummary> {
        let now = Utc::now();
        let persisted = self.persisted_last_run().await;

        {
            let mut guard = lock(&self.guard);
            match guard.check(now, persisted, self.min_interval()) {
                TriggerDecision::Run => {
                    guard.running = true;
                    guard.last_run_at = Some(now);
                }
                TriggerDecision::AlreadyRunning => {
                    debug!("Sync run already in progress; skipping trigger");
                    counter!("calsync_scheduler_skipped_total", "reason" => "running").increment(1);
                    return None;
                }
                TriggerDecision::TooSoon { next_allowed_at } => {
                    debug!(%next_allowed_at, "Minimum interval not elapsed; skipping trigger");
                    counter!("calsync_scheduler_skipped_total", "reason" => "interval").increment(1);
                    return None;
                }
            }
        }

        // Clear the running flag however the run ends.
        let _running = scopeguard::guard(&self.guard, |guard| {
            lock(guard).running = false;
        });

        if let Err(err) = self
            .orchestrator
            .store()
            .set_setting(LAST_RUN_AT_KEY, JsonValue::String(now.to_rfc3339()))
            .await
        {
            warn!(error = %err, "Failed to persist last run marker");
        }

        Some(self.orchestrator.run_sync(&self.targets).await)
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    ///
    /// The first run starts immediately. A run in progress is never
    /// interrupted; shutdown is observed between ticks.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            calendars = self.targets.len(),
            tick_interval_seconds = self.config.tick_interval_seconds,
            "Starting sync scheduler"
        );
        let tick_interval = TokioDuration::from_secs(self.config.tick_interval_seconds);

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.tick().await;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync scheduler shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {}
            }
        }

        info!("Sync scheduler stopped");
    }

    #[instrument(skip_all)]
    async fn tick(&self) {
        let tick_started = Instant::now();
        if let Some(summary) = self.trigger().await {
            info!(
                run_id = %summary.run_id,
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                "Scheduled sync run complete"
            );
        }
        histogram!("calsync_scheduler_tick_duration_ms")
            .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
    }
}

fn lock(guard: &Mutex<RunGuard>) -> MutexGuard<'_, RunGuard> {
    guard.lock().unwrap_or_else(|poison| poison.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn idle_guard_allows_first_run() {
        let guard = RunGuard::default();
        assert_eq!(guard.check(at(0), None, Duration::minutes(5)), TriggerDecision::Run);
    }

    #[test]
    fn running_guard_blocks() {
        let guard = RunGuard {
            last_run_at: None,
            running: true,
        };
        assert_eq!(
            guard.check(at(30), None, Duration::zero()),
            TriggerDecision::AlreadyRunning
        );
    }

    #[test]
    fn minimum_interval_uses_latest_of_memory_and_store() {
        let guard = RunGuard {
            last_run_at: Some(at(0)),
            running: false,
        };
        assert_eq!(
            guard.check(at(4), None, Duration::minutes(5)),
            TriggerDecision::TooSoon {
                next_allowed_at: at(5)
            }
        );
        assert_eq!(guard.check(at(5), None, Duration::minutes(5)), TriggerDecision::Run);

        // Persisted marker from another process is newer.
        assert_eq!(
            guard.check(at(6), Some(at(3)), Duration::minutes(5)),
            TriggerDecision::TooSoon {
                next_allowed_at: at(8)
            }
        );
        assert_eq!(
            RunGuard::default().check(at(6), Some(at(3)), Duration::minutes(5)),
            TriggerDecision::TooSoon {
                next_allowed_at: at(8)
            }
        );
    }

    #[test]
    fn unbounded_interval_saturates_instead_of_overflowing() {
        let guard = RunGuard {
            last_run_at: Some(at(0)),
            running: false,
        };
        assert_eq!(
            guard.check(at(30), None, Duration::MAX),
            TriggerDecision::TooSoon {
                next_allowed_at: DateTime::<Utc>::MAX_UTC
            }
        );
    }
}
