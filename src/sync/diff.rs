//! Field-level comparison between a stored record and an incoming event.
//!
//! Values are compared in a normalized string form: text is trimmed, empty
//! text counts as absent, timestamps are rendered in UTC and dates as
//! `YYYY-MM-DD`. A boundary stored in timestamp form is compared as a
//! timestamp, otherwise as a date.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};

use crate::models::event_record;
use crate::sync::event::{EventTime, NormalizedEvent};

/// One changed field, rendered for detail logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.field,
            self.old.as_deref().unwrap_or("∅"),
            self.new.as_deref().unwrap_or("∅")
        )
    }
}

fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn timestamp<Tz: chrono::TimeZone>(value: Option<&DateTime<Tz>>) -> Option<String> {
    value.map(|at| {
        at.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    })
}

fn date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

fn amount(value: Option<f64>) -> Option<String> {
    value.map(|v| format!("{v:.2}"))
}

/// Stored boundary in comparable form: timestamp if present, else date.
fn stored_boundary(
    date_time: Option<&DateTime<FixedOffset>>,
    day: Option<NaiveDate>,
) -> Option<String> {
    timestamp(date_time).or_else(|| date(day))
}

fn incoming_boundary(time: &EventTime) -> Option<String> {
    match time {
        EventTime::DateTime { at, .. } => timestamp(Some(at)),
        EventTime::Date(day) => date(Some(*day)),
        EventTime::Unspecified => None,
    }
}

/// Fields that differ between `existing` and `incoming`, in a stable order.
pub fn diff_fields(existing: &event_record::Model, incoming: &NormalizedEvent) -> Vec<FieldChange> {
    let pairs: [(&'static str, Option<String>, Option<String>); 18] = [
        (
            "status",
            text(existing.status.as_deref()),
            text(incoming.status.as_deref()),
        ),
        (
            "event_type",
            text(existing.event_type.as_deref()),
            text(incoming.event_type.as_deref()),
        ),
        (
            "summary",
            text(existing.summary.as_deref()),
            text(incoming.summary.as_deref()),
        ),
        (
            "description",
            text(existing.description.as_deref()),
            text(incoming.description.as_deref()),
        ),
        (
            "location",
            text(existing.location.as_deref()),
            text(incoming.location.as_deref()),
        ),
        (
            "visibility",
            text(existing.visibility.as_deref()),
            text(incoming.visibility.as_deref()),
        ),
        (
            "html_link",
            text(existing.html_link.as_deref()),
            text(incoming.html_link.as_deref()),
        ),
        (
            "recurring_event_id",
            text(existing.recurring_event_id.as_deref()),
            text(incoming.recurring_event_id.as_deref()),
        ),
        (
            "start",
            stored_boundary(existing.start_date_time.as_ref(), existing.start_date),
            incoming_boundary(&incoming.start),
        ),
        (
            "start_time_zone",
            text(existing.start_time_zone.as_deref()),
            text(incoming.start.time_zone()),
        ),
        (
            "end",
            stored_boundary(existing.end_date_time.as_ref(), existing.end_date),
            incoming_boundary(&incoming.end),
        ),
        (
            "end_time_zone",
            text(existing.end_time_zone.as_deref()),
            text(incoming.end.time_zone()),
        ),
        (
            "remote_created_at",
            timestamp(existing.remote_created_at.as_ref()),
            timestamp(incoming.remote_created_at.as_ref()),
        ),
        (
            "remote_updated_at",
            timestamp(existing.remote_updated_at.as_ref()),
            timestamp(incoming.remote_updated_at.as_ref()),
        ),
        (
            "expected_amount",
            amount(existing.expected_amount),
            amount(incoming.fields.expected_amount),
        ),
        (
            "paid_amount",
            amount(existing.paid_amount),
            amount(incoming.fields.paid_amount),
        ),
        (
            "category",
            text(existing.category.as_deref()),
            text(incoming.fields.category.as_deref()),
        ),
        (
            "attendance",
            text(existing.attendance.as_deref()),
            text(incoming.fields.attendance.as_deref()),
        ),
    ];

    pairs
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, old, new)| FieldChange { field, old, new })
        .collect()
}
