//! Per-calendar synchronization passes.
//!
//! A pass fetches pages (by cursor when one is stored, otherwise by time
//! window), classifies each item, writes the changes once every page is in
//! and finally persists the new resumption cursor. A cursor the provider no longer accepts is
//! cleared and the pass is restarted once from a full window.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::histogram;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::calendar_source;
use crate::provider::{FetchMode, PageFetcher, RawEvent};
use crate::store::EventStore;
use crate::sync::classifier::{
    Classification, EventClassifier, Exclusion, FieldExtractor, NoopFieldExtractor,
};
use crate::sync::event::NormalizedEvent;
use crate::sync::exclusions::{ExclusionRules, load_exclusions};
use crate::sync::outcome::{CalendarReport, CalendarTarget, RunSummary, SyncMode, SyncOutcome};
use crate::sync::upsert::UpsertEngine;
use crate::sync::window::SyncWindow;

pub struct SyncOrchestrator {
    fetcher: PageFetcher,
    store: Arc<dyn EventStore>,
    extractor: Arc<dyn FieldExtractor>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(fetcher: PageFetcher, store: Arc<dyn EventStore>, config: SyncConfig) -> Self {
        Self {
            fetcher,
            store,
            extractor: Arc::new(NoopFieldExtractor),
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Synchronize every target in order. A failing calendar never stops the others.
    pub async fn run_sync(&self, targets: &[CalendarTarget]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, calendars = targets.len(), "Starting sync run");

        let classifier = self.build_classifier().await;

        let mut calendars = Vec::with_capacity(targets.len());
        for target in targets {
            match self.sync_with(target, &classifier).await {
                Ok(outcome) => calendars.push(CalendarReport::Synced {
                    calendar_id: target.external_id.clone(),
                    outcome,
                }),
                Err(err) => {
                    error!(
                        %run_id,
                        calendar_id = %target.external_id,
                        code = err.code(),
                        error = %err,
                        "Calendar sync failed"
                    );
                    calendars.push(CalendarReport::Failed {
                        calendar_id: target.external_id.clone(),
                        code: err.code().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            calendars,
        };
        info!(
            %run_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Sync run finished"
        );
        summary
    }

    /// Synchronize a single calendar with freshly loaded exclusion rules.
    pub async fn sync_calendar(&self, target: &CalendarTarget) -> Result<SyncOutcome, SyncError> {
        let classifier = self.build_classifier().await;
        self.sync_with(target, &classifier).await
    }

    async fn build_classifier(&self) -> EventClassifier {
        let rules = match load_exclusions(self.store.as_ref(), &self.config.exclude_patterns).await
        {
            Ok(rules) => rules,
            Err(err) => {
                warn!(error = %err, "Failed to load exclusion settings; using configured patterns only");
                ExclusionRules::new(self.config.exclude_patterns.iter())
            }
        };
        EventClassifier::new(rules, self.extractor.clone())
    }

    #[instrument(skip_all, fields(calendar_id = %target.external_id))]
    async fn sync_with(
        &self,
        target: &CalendarTarget,
        classifier: &EventClassifier,
    ) -> Result<SyncOutcome, SyncError> {
        let timer = Instant::now();
        let calendar = self
            .store
            .upsert_calendar(&target.external_id, target.display_name.as_deref())
            .await?;
        let now = Utc::now();

        let cursor = calendar
            .resumption_cursor
            .clone()
            .filter(|c| !c.trim().is_empty());

        let result = match cursor {
            Some(cursor) => {
                match self
                    .run_pass(&calendar, FetchMode::Cursor(cursor), classifier, now)
                    .await
                {
                    Err(SyncError::CursorInvalidated(err)) => {
                        warn!(
                            code = err.code,
                            reason = %err.reason,
                            "Resumption cursor invalidated; clearing it and running a full sync"
                        );
                        self.store.set_cursor(calendar.id, None).await?;
                        let window = SyncWindow::compute(&self.config, None, now, false);
                        self.run_pass(&calendar, FetchMode::Window(window), classifier, now)
                            .await
                    }
                    other => other,
                }
            }
            None => {
                let last_synced = calendar.last_synced_at.map(|at| at.with_timezone(&Utc));
                let window = SyncWindow::compute(&self.config, last_synced, now, true);
                self.run_pass(&calendar, FetchMode::Window(window), classifier, now)
                    .await
            }
        };

        histogram!("calsync_pass_duration_ms").record(timer.elapsed().as_millis() as f64);
        result
    }

    async fn run_pass(
        &self,
        calendar: &calendar_source::Model,
        mode: FetchMode,
        classifier: &EventClassifier,
        synced_at: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let sync_mode = if mode.is_incremental() {
            SyncMode::Incremental
        } else {
            SyncMode::Full
        };

        let mut engine = UpsertEngine::new(self.store.clone(), &self.config, synced_at);
        engine.seed_calendar(&calendar.external_id, calendar.id);

        let mut outcome = SyncOutcome::new(sync_mode, self.config.detail_limit);
        let mut next_cursor = None;
        let mut stream = self
            .fetcher
            .stream(&calendar.external_id, mode, self.config.page_cap);

        while let Some(page) = stream.next().await {
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    // Keep what earlier pages delivered; the cursor stays put.
                    outcome.absorb(engine.flush(sync_mode).await);
                    return Err(err.into());
                }
            };
            let (events, exclusions) = split_page(classifier, &calendar.external_id, &page.items);
            engine.stage(events, exclusions);
            if page.next_cursor.is_some() {
                next_cursor = page.next_cursor;
            }
        }
        outcome.absorb(engine.flush(sync_mode).await);

        outcome.pages_fetched = stream.pages_fetched();
        outcome.page_cap_reached = stream.cap_reached();

        if outcome.page_cap_reached {
            warn!(
                pages = outcome.pages_fetched,
                "Pass ended at the page cap; cursor left unchanged"
            );
            return Ok(outcome);
        }

        if let Some(cursor) = next_cursor {
            self.store.set_cursor(calendar.id, Some(&cursor)).await?;
            outcome.cursor_advanced = true;
        }
        self.store.mark_synced(calendar.id, synced_at).await?;

        info!(
            mode = ?outcome.mode,
            pages = outcome.pages_fetched,
            inserted = outcome.inserted,
            updated = outcome.updated,
            deleted = outcome.deleted,
            skipped = outcome.skipped,
            cursor_advanced = outcome.cursor_advanced,
            "Calendar pass complete"
        );
        Ok(outcome)
    }
}

fn split_page(
    classifier: &EventClassifier,
    calendar_external_id: &str,
    items: &[RawEvent],
) -> (Vec<NormalizedEvent>, Vec<Exclusion>) {
    let mut events = Vec::new();
    let mut exclusions = Vec::new();
    for item in items {
        match classifier.classify(calendar_external_id, item) {
            Classification::Kept(event) => events.push(*event),
            Classification::Excluded(exclusion) => exclusions.push(exclusion),
            Classification::Dropped => {}
        }
    }
    (events, exclusions)
}
