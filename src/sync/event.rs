//! Normalized event representation shared by the classifier, the diff and the store.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use crate::provider::RawEventTime;

/// Start or end of an event after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day event boundary.
    Date(NaiveDate),
    /// Timed boundary, with the provider's IANA zone name when given.
    DateTime {
        at: DateTime<FixedOffset>,
        time_zone: Option<String>,
    },
    Unspecified,
}

impl EventTime {
    /// Normalize a raw boundary. A timestamp wins when both forms are present.
    pub fn from_raw(raw: Option<&RawEventTime>) -> Self {
        let Some(raw) = raw else {
            return EventTime::Unspecified;
        };

        if let Some(value) = raw.date_time.as_deref() {
            match DateTime::parse_from_rfc3339(value) {
                Ok(at) => {
                    return EventTime::DateTime {
                        at,
                        time_zone: raw.time_zone.clone().filter(|tz| !tz.is_empty()),
                    };
                }
                Err(err) => debug!(value, error = %err, "Unparseable event dateTime"),
            }
        }

        if let Some(value) = raw.date.as_deref() {
            match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(date) => return EventTime::Date(date),
                Err(err) => debug!(value, error = %err, "Unparseable event date"),
            }
        }

        EventTime::Unspecified
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            EventTime::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn date_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            EventTime::DateTime { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub fn time_zone(&self) -> Option<&str> {
        match self {
            EventTime::DateTime { time_zone, .. } => time_zone.as_deref(),
            _ => None,
        }
    }
}

/// Opaque fields derived from the event text by a [`FieldExtractor`](crate::sync::classifier::FieldExtractor).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub expected_amount: Option<f64>,
    pub paid_amount: Option<f64>,
    pub category: Option<String>,
    pub attendance: Option<String>,
}

/// A kept remote event, ready to be diffed against the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub calendar_external_id: String,
    pub external_id: String,
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub visibility: Option<String>,
    pub html_link: Option<String>,
    pub recurring_event_id: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub remote_created_at: Option<DateTime<Utc>>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub fields: ParsedFields,
}

/// Parse a provider timestamp into UTC, ignoring garbage.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: Option<&str>, date_time: Option<&str>, tz: Option<&str>) -> RawEventTime {
        RawEventTime {
            date: date.map(str::to_string),
            date_time: date_time.map(str::to_string),
            time_zone: tz.map(str::to_string),
        }
    }

    #[test]
    fn timestamp_form_is_preferred() {
        let time = EventTime::from_raw(Some(&raw(
            Some("2024-01-02"),
            Some("2024-01-02T09:00:00+02:00"),
            Some("Europe/Berlin"),
        )));
        assert_eq!(
            time.date_time().map(|at| at.to_rfc3339()),
            Some("2024-01-02T09:00:00+02:00".to_string())
        );
        assert_eq!(time.time_zone(), Some("Europe/Berlin"));
        assert!(time.date().is_none());
    }

    #[test]
    fn date_only_and_fallbacks() {
        let time = EventTime::from_raw(Some(&raw(Some("2024-03-01"), None, None)));
        assert_eq!(time.date(), NaiveDate::from_ymd_opt(2024, 3, 1));

        let time = EventTime::from_raw(Some(&raw(Some("2024-03-01"), Some("garbage"), None)));
        assert_eq!(time.date(), NaiveDate::from_ymd_opt(2024, 3, 1));

        assert_eq!(EventTime::from_raw(None), EventTime::Unspecified);
        assert_eq!(
            EventTime::from_raw(Some(&raw(Some("03/01/2024"), None, None))),
            EventTime::Unspecified
        );
    }

    #[test]
    fn timestamps_are_converted_to_utc() {
        assert_eq!(
            parse_timestamp(Some("2024-01-01T10:00:00+01:00")).map(|t| t.to_rfc3339()),
            Some("2024-01-01T09:00:00+00:00".to_string())
        );
        assert!(parse_timestamp(Some("yesterday")).is_none());
        assert!(parse_timestamp(None).is_none());
    }
}
