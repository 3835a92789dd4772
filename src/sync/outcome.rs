//! Result types reported by a sync pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Whether the pass used a resumption cursor or a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKind {
    Inserted,
    Updated,
    Deleted,
    Skipped,
}

/// One human-readable line about a single event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailLog {
    pub kind: DetailKind,
    pub external_event_id: String,
    pub message: String,
}

/// Counts and bounded details for one calendar pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub mode: SyncMode,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub details: Vec<DetailLog>,
    /// Detail lines dropped once `detail_limit` was reached.
    pub details_truncated: u64,
    #[serde(skip)]
    pub detail_limit: usize,
    pub pages_fetched: usize,
    pub page_cap_reached: bool,
    pub cursor_advanced: bool,
}

impl SyncOutcome {
    pub fn new(mode: SyncMode, detail_limit: usize) -> Self {
        Self {
            mode,
            inserted: 0,
            updated: 0,
            skipped: 0,
            deleted: 0,
            details: Vec::new(),
            details_truncated: 0,
            detail_limit,
            pages_fetched: 0,
            page_cap_reached: false,
            cursor_advanced: false,
        }
    }

    pub fn record(&mut self, kind: DetailKind, external_event_id: &str, message: String) {
        match kind {
            DetailKind::Inserted => self.inserted += 1,
            DetailKind::Updated => self.updated += 1,
            DetailKind::Deleted => self.deleted += 1,
            DetailKind::Skipped => self.skipped += 1,
        }
        self.push_detail(DetailLog {
            kind,
            external_event_id: external_event_id.to_string(),
            message,
        });
    }

    /// Count an unchanged event without a detail line.
    pub fn record_unchanged(&mut self) {
        self.skipped += 1;
    }

    fn push_detail(&mut self, detail: DetailLog) {
        if self.details.len() < self.detail_limit {
            self.details.push(detail);
        } else {
            self.details_truncated += 1;
        }
    }

    /// Merge a page-level outcome into this pass.
    pub fn absorb(&mut self, other: SyncOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.details_truncated += other.details_truncated;
        for detail in other.details {
            self.push_detail(detail);
        }
    }

    pub fn total_writes(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

/// A calendar to synchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarTarget {
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CalendarTarget {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: None,
        }
    }

    /// Parse a configuration entry of the form `id` or `id=Display Name`.
    pub fn parse(entry: &str) -> Option<Self> {
        let (id, name) = match entry.split_once('=') {
            Some((id, name)) => (id.trim(), Some(name.trim())),
            None => (entry.trim(), None),
        };
        if id.is_empty() {
            return None;
        }
        Some(Self {
            external_id: id.to_string(),
            display_name: name.filter(|n| !n.is_empty()).map(str::to_string),
        })
    }
}

/// Per-calendar result inside a [`RunSummary`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalendarReport {
    Synced {
        calendar_id: String,
        outcome: SyncOutcome,
    },
    Failed {
        calendar_id: String,
        code: String,
        error: String,
    },
}

/// Aggregate result of one `run_sync` call.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub calendars: Vec<CalendarReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.calendars
            .iter()
            .filter(|c| matches!(c, CalendarReport::Synced { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.calendars.len() - self.succeeded()
    }

    pub fn outcome_for(&self, calendar_id: &str) -> Option<&SyncOutcome> {
        self.calendars.iter().find_map(|report| match report {
            CalendarReport::Synced {
                calendar_id: id,
                outcome,
            } if id == calendar_id => Some(outcome),
            _ => None,
        })
    }
}
