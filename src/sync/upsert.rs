//! Writes classified events into the local store.
//!
//! Kept events are inserted, updated with a field diff, or left alone when
//! nothing changed. Excluded events are deleted if a local copy exists. One
//! engine is created per pass so the calendar id cache and the staged
//! changes never outlive it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::store::EventStore;
use crate::sync::classifier::Exclusion;
use crate::sync::diff::{FieldChange, diff_fields};
use crate::sync::event::NormalizedEvent;
use crate::sync::outcome::{DetailKind, SyncMode, SyncOutcome};

const UNTITLED: &str = "(untitled)";

/// What happened to a single kept event.
#[derive(Debug)]
enum EventResult {
    Inserted,
    Updated(Vec<FieldChange>),
    Unchanged,
}

/// A classified item waiting to be written.
#[derive(Debug)]
enum PendingChange {
    Upsert(NormalizedEvent),
    Remove(Exclusion),
}

impl PendingChange {
    fn key(&self) -> (String, String) {
        match self {
            PendingChange::Upsert(e) => (e.calendar_external_id.clone(), e.external_id.clone()),
            PendingChange::Remove(e) => {
                (e.calendar_external_id.clone(), e.external_event_id.clone())
            }
        }
    }
}

pub struct UpsertEngine {
    store: Arc<dyn EventStore>,
    batch_size: usize,
    parallel_batches: bool,
    detail_limit: usize,
    synced_at: DateTime<Utc>,
    calendar_ids: HashMap<String, i32>,
    pending: Vec<PendingChange>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn EventStore>, config: &SyncConfig, synced_at: DateTime<Utc>) -> Self {
        Self {
            store,
            batch_size: config.batch_size.max(1),
            parallel_batches: config.parallel_batches,
            detail_limit: config.detail_limit,
            synced_at,
            calendar_ids: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Pre-populate the calendar id cache with a row the caller already holds.
    pub fn seed_calendar(&mut self, external_id: &str, id: i32) {
        self.calendar_ids.insert(external_id.to_string(), id);
    }

    async fn calendar_id(&mut self, external_id: &str) -> Result<i32, StoreError> {
        if let Some(id) = self.calendar_ids.get(external_id) {
            return Ok(*id);
        }
        let calendar = self.store.upsert_calendar(external_id, None).await?;
        self.calendar_ids.insert(external_id.to_string(), calendar.id);
        Ok(calendar.id)
    }

    /// Queue a page of classified items for the next [`flush`](Self::flush).
    pub fn stage(&mut self, events: Vec<NormalizedEvent>, exclusions: Vec<Exclusion>) {
        self.pending.extend(events.into_iter().map(PendingChange::Upsert));
        self.pending.extend(exclusions.into_iter().map(PendingChange::Remove));
    }

    /// Stage and immediately write one set of changes.
    pub async fn apply(
        &mut self,
        events: Vec<NormalizedEvent>,
        exclusions: Vec<Exclusion>,
        mode: SyncMode,
    ) -> SyncOutcome {
        self.stage(events, exclusions);
        self.flush(mode).await
    }

    /// Write everything staged so far.
    ///
    /// Each event id is written once: the last staged occurrence decides
    /// whether it is upserted or removed.
    pub async fn flush(&mut self, mode: SyncMode) -> SyncOutcome {
        let mut outcome = SyncOutcome::new(mode, self.detail_limit);

        let staged = std::mem::take(&mut self.pending);
        let mut events = Vec::new();
        let mut exclusions = Vec::new();
        for change in dedupe_last_wins(staged, PendingChange::key) {
            match change {
                PendingChange::Upsert(event) => events.push(event),
                PendingChange::Remove(exclusion) => exclusions.push(exclusion),
            }
        }

        let mut resolved = Vec::with_capacity(events.len());
        for event in events {
            match self.calendar_id(&event.calendar_external_id).await {
                Ok(id) => resolved.push((id, event)),
                Err(err) => {
                    error!(
                        calendar_id = %event.calendar_external_id,
                        event_id = %event.external_id,
                        error = %err,
                        "Failed to resolve calendar for event"
                    );
                    outcome.record(
                        DetailKind::Skipped,
                        &event.external_id,
                        format!("calendar lookup failed: {err}"),
                    );
                }
            }
        }

        for batch in resolved.chunks(self.batch_size) {
            let results = if self.parallel_batches {
                self.run_batch_concurrently(batch).await
            } else {
                let mut results = Vec::with_capacity(batch.len());
                for (calendar_id, event) in batch {
                    let result =
                        upsert_one(self.store.as_ref(), *calendar_id, event, self.synced_at).await;
                    results.push((event.external_id.clone(), result.map_err(|e| e.to_string())));
                }
                results
            };

            for (external_id, result) in results {
                match result {
                    Ok(EventResult::Inserted) => {
                        outcome.record(DetailKind::Inserted, &external_id, "inserted".to_string())
                    }
                    Ok(EventResult::Updated(changes)) => {
                        let rendered = changes
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; ");
                        outcome.record(
                            DetailKind::Updated,
                            &external_id,
                            format!("{external_id} {rendered}"),
                        );
                    }
                    Ok(EventResult::Unchanged) => outcome.record_unchanged(),
                    Err(message) => {
                        warn!(event_id = %external_id, error = %message, "Event write failed; skipping");
                        outcome.record(DetailKind::Skipped, &external_id, message);
                    }
                }
            }
        }

        for exclusion in exclusions {
            if let Err(err) = self.remove_excluded(&exclusion, &mut outcome).await {
                warn!(
                    event_id = %exclusion.external_event_id,
                    error = %err,
                    "Failed to remove excluded event; skipping"
                );
                outcome.record(
                    DetailKind::Skipped,
                    &exclusion.external_event_id,
                    format!("delete failed: {err}"),
                );
            }
        }

        counter!("calsync_events_inserted_total").increment(outcome.inserted);
        counter!("calsync_events_updated_total").increment(outcome.updated);
        counter!("calsync_events_deleted_total").increment(outcome.deleted);
        counter!("calsync_events_skipped_total").increment(outcome.skipped);

        outcome
    }

    /// Spawn one task per event and wait for the whole batch.
    async fn run_batch_concurrently(
        &self,
        batch: &[(i32, NormalizedEvent)],
    ) -> Vec<(String, Result<EventResult, String>)> {
        let handles: Vec<_> = batch
            .iter()
            .map(|(calendar_id, event)| {
                let store = self.store.clone();
                let calendar_id = *calendar_id;
                let event = event.clone();
                let synced_at = self.synced_at;
                let external_id = event.external_id.clone();
                let handle = tokio::spawn(async move {
                    upsert_one(store.as_ref(), calendar_id, &event, synced_at).await
                });
                (external_id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (external_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(join_err) => Err(format!("write task failed: {join_err}")),
            };
            results.push((external_id, result));
        }
        results
    }

    async fn remove_excluded(
        &mut self,
        exclusion: &Exclusion,
        outcome: &mut SyncOutcome,
    ) -> Result<(), StoreError> {
        let calendar_id = self.calendar_id(&exclusion.calendar_external_id).await?;

        let label = match self
            .store
            .find_event(calendar_id, &exclusion.external_event_id)
            .await
        {
            Ok(Some(existing)) => existing
                .summary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNTITLED)
                .to_string(),
            Ok(None) => UNTITLED.to_string(),
            Err(err) => {
                warn!(
                    event_id = %exclusion.external_event_id,
                    error = %err,
                    "Label lookup failed; deleting anyway"
                );
                UNTITLED.to_string()
            }
        };

        if self
            .store
            .delete_event(calendar_id, &exclusion.external_event_id)
            .await?
        {
            outcome.record(
                DetailKind::Deleted,
                &exclusion.external_event_id,
                format!(
                    "{} \"{}\" removed ({})",
                    exclusion.external_event_id, label, exclusion.reason
                ),
            );
        } else {
            debug!(
                event_id = %exclusion.external_event_id,
                reason = %exclusion.reason,
                "Excluded event has no local copy"
            );
        }
        Ok(())
    }
}

async fn upsert_one(
    store: &dyn EventStore,
    calendar_id: i32,
    event: &NormalizedEvent,
    synced_at: DateTime<Utc>,
) -> Result<EventResult, StoreError> {
    match store.find_event(calendar_id, &event.external_id).await? {
        None => {
            store.insert_event(calendar_id, event, synced_at).await?;
            Ok(EventResult::Inserted)
        }
        Some(existing) => {
            let changes = diff_fields(&existing, event);
            if changes.is_empty() {
                return Ok(EventResult::Unchanged);
            }
            store.update_event(existing.id, event, synced_at).await?;
            Ok(EventResult::Updated(changes))
        }
    }
}

/// Keep only the last item per key, preserving first-seen order of keys.
fn dedupe_last_wins<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut slots: Vec<Option<T>> = Vec::with_capacity(items.len());

    for item in items {
        match positions.get(&key(&item)) {
            Some(&index) => slots[index] = Some(item),
            None => {
                positions.insert(key(&item), slots.len());
                slots.push(Some(item));
            }
        }
    }

    slots.into_iter().flatten().collect()
}
