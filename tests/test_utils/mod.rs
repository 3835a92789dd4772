//! Shared helpers for integration tests.
//!
//! In-memory SQLite databases with migrations applied, a wiremock-backed
//! orchestrator, JSON builders for `events.list` pages, and store wrappers
//! that record or inject failures.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use calsync::config::{RetryPolicyConfig, SyncConfig};
use calsync::error::StoreError;
use calsync::models::{calendar_source, event_record};
use calsync::provider::{
    HttpCalendarClient, PageFetcher, RetryExecutor, RetryPolicy, StaticTokenSource,
};
use calsync::store::{EventStore, SeaOrmEventStore};
use calsync::sync::{NormalizedEvent, SyncOrchestrator};
use chrono::{DateTime, NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{Value as JsonValue, json};
use url::Url;

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The pool is pinned to one connection; every new connection to
/// `sqlite::memory:` would otherwise open a separate empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

pub async fn setup_test_store() -> Result<Arc<SeaOrmEventStore>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(SeaOrmEventStore::new(Arc::new(db))))
}

/// Retry policy with millisecond delays and no jitter.
pub fn fast_retry() -> RetryPolicyConfig {
    RetryPolicyConfig {
        max_attempts: 4,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: 0.0,
    }
}

/// Window fixed to `[2024-01-01, 2024-04-01)`.
pub fn q1_2024_config() -> SyncConfig {
    SyncConfig {
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        end_date: NaiveDate::from_ymd_opt(2024, 4, 1),
        ..SyncConfig::default()
    }
}

pub fn api_base(server_uri: &str) -> Url {
    Url::parse(&format!("{server_uri}/calendar/v3/")).expect("valid mock server url")
}

pub fn events_path(calendar_id: &str) -> String {
    format!("/calendar/v3/calendars/{calendar_id}/events")
}

pub fn fetcher(server_uri: &str) -> PageFetcher {
    let client = HttpCalendarClient::new(
        api_base(server_uri),
        Arc::new(StaticTokenSource::new("test-token")),
        Duration::from_secs(5),
    )
    .expect("client builds");
    PageFetcher::new(
        Arc::new(client),
        RetryExecutor::new(RetryPolicy::from_config(&fast_retry())),
    )
}

pub fn orchestrator(
    server_uri: &str,
    store: Arc<dyn EventStore>,
    config: SyncConfig,
) -> SyncOrchestrator {
    SyncOrchestrator::new(fetcher(server_uri), store, config)
}

/// An active timed event.
pub fn event_json(id: &str, summary: &str, start: &str, end: &str) -> JsonValue {
    json!({
        "id": id,
        "status": "confirmed",
        "summary": summary,
        "start": {"dateTime": start, "timeZone": "UTC"},
        "end": {"dateTime": end, "timeZone": "UTC"},
        "created": "2023-12-01T08:00:00Z",
        "updated": "2023-12-15T08:00:00Z",
        "htmlLink": format!("https://calendar.example.test/event?eid={id}")
    })
}

/// An active all-day event.
pub fn all_day_json(id: &str, summary: &str, start: &str, end: &str) -> JsonValue {
    json!({
        "id": id,
        "status": "confirmed",
        "summary": summary,
        "start": {"date": start},
        "end": {"date": end}
    })
}

pub fn cancelled_json(id: &str) -> JsonValue {
    json!({"id": id, "status": "cancelled"})
}

pub fn page_json(
    items: Vec<JsonValue>,
    next_page_token: Option<&str>,
    next_sync_token: Option<&str>,
) -> JsonValue {
    let mut page = json!({ "kind": "calendar#events", "items": items });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    if let Some(token) = next_sync_token {
        page["nextSyncToken"] = json!(token);
    }
    page
}

pub fn error_json(code: u16, reason: &str, message: &str) -> JsonValue {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"domain": "global", "reason": reason, "message": message}]
        }
    })
}

/// Forwards to an inner store and records every cursor and event write.
pub struct RecordingStore {
    inner: Arc<dyn EventStore>,
    cursor_writes: Mutex<Vec<Option<String>>>,
    event_writes: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            cursor_writes: Mutex::new(Vec::new()),
            event_writes: Mutex::new(Vec::new()),
        }
    }

    pub fn cursor_writes(&self) -> Vec<Option<String>> {
        self.cursor_writes.lock().unwrap().clone()
    }

    /// External ids passed to `insert_event` or `update_event`, in call order.
    pub fn event_writes(&self) -> Vec<String> {
        self.event_writes.lock().unwrap().clone()
    }

    fn record_write(&self, external_id: &str) -> Result<(), StoreError> {
        self.event_writes
            .lock()
            .unwrap()
            .push(external_id.to_string());
        Ok(())
    }
}

/// Forwards to an inner store but fails writes, and optionally lookups, for
/// selected event ids.
pub struct FailingStore {
    inner: Arc<dyn EventStore>,
    failing_ids: HashSet<String>,
    failing_lookups: HashSet<String>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn EventStore>, failing_ids: &[&str]) -> Self {
        Self {
            inner,
            failing_ids: failing_ids.iter().map(|id| id.to_string()).collect(),
            failing_lookups: HashSet::new(),
        }
    }

    /// Make `find_event` fail for these ids as well.
    pub fn with_failing_lookups(mut self, ids: &[&str]) -> Self {
        self.failing_lookups = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    fn check(&self, external_id: &str) -> Result<(), StoreError> {
        if self.failing_ids.contains(external_id) {
            return Err(StoreError::InvalidData {
                message: format!("injected failure for {external_id}"),
            });
        }
        Ok(())
    }

    fn check_lookup(&self, external_id: &str) -> Result<(), StoreError> {
        if self.failing_lookups.contains(external_id) {
            return Err(StoreError::InvalidData {
                message: format!("injected lookup failure for {external_id}"),
            });
        }
        Ok(())
    }
}

macro_rules! forward_event_store {
    (
        $ty:ty,
        |$this:ident, $event:ident| $before_write:expr,
        |$this2:ident, $cursor:ident| $on_cursor:expr,
        |$this3:ident, $lookup:ident| $before_find:expr
    ) => {
        #[async_trait]
        impl EventStore for $ty {
            async fn upsert_calendar(
                &self,
                external_id: &str,
                display_name: Option<&str>,
            ) -> Result<calendar_source::Model, StoreError> {
                self.inner.upsert_calendar(external_id, display_name).await
            }

            async fn find_calendar(
                &self,
                external_id: &str,
            ) -> Result<Option<calendar_source::Model>, StoreError> {
                self.inner.find_calendar(external_id).await
            }

            async fn set_cursor(
                &self,
                calendar_id: i32,
                cursor: Option<&str>,
            ) -> Result<(), StoreError> {
                {
                    let $this2 = self;
                    let $cursor = cursor;
                    $on_cursor;
                }
                self.inner.set_cursor(calendar_id, cursor).await
            }

            async fn mark_synced(
                &self,
                calendar_id: i32,
                at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                self.inner.mark_synced(calendar_id, at).await
            }

            async fn find_event(
                &self,
                calendar_id: i32,
                external_event_id: &str,
            ) -> Result<Option<event_record::Model>, StoreError> {
                {
                    let $this3 = self;
                    let $lookup = external_event_id;
                    $before_find?;
                }
                self.inner.find_event(calendar_id, external_event_id).await
            }

            async fn insert_event(
                &self,
                calendar_id: i32,
                event: &NormalizedEvent,
                synced_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                {
                    let $this = self;
                    let $event = event;
                    $before_write?;
                }
                self.inner.insert_event(calendar_id, event, synced_at).await
            }

            async fn update_event(
                &self,
                record_id: i32,
                event: &NormalizedEvent,
                synced_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                {
                    let $this = self;
                    let $event = event;
                    $before_write?;
                }
                self.inner.update_event(record_id, event, synced_at).await
            }

            async fn delete_event(
                &self,
                calendar_id: i32,
                external_event_id: &str,
            ) -> Result<bool, StoreError> {
                self.inner.delete_event(calendar_id, external_event_id).await
            }

            async fn get_setting(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
                self.inner.get_setting(key).await
            }

            async fn set_setting(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
                self.inner.set_setting(key, value).await
            }
        }
    };
}

forward_event_store!(
    RecordingStore,
    |this, event| this.record_write(&event.external_id),
    |this, cursor| this
        .cursor_writes
        .lock()
        .unwrap()
        .push(cursor.map(str::to_string)),
    |_this, _id| Ok::<(), StoreError>(())
);

forward_event_store!(
    FailingStore,
    |this, event| this.check(&event.external_id),
    |_this, _cursor| (),
    |this, id| this.check_lookup(id)
);
