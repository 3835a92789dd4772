//! Decides what happens to each remote item: dropped, excluded or kept.

use std::sync::Arc;

use tracing::debug;

use crate::provider::RawEvent;
use crate::sync::event::{EventTime, NormalizedEvent, ParsedFields, parse_timestamp};
use crate::sync::exclusions::ExclusionRules;

/// Why an item is removed from the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    Cancelled,
    /// Source of the matching exclusion pattern.
    Pattern(String),
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::Cancelled => write!(f, "cancelled"),
            ExclusionReason::Pattern(pattern) => write!(f, "pattern '{pattern}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub calendar_external_id: String,
    pub external_event_id: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Item without an identifier.
    Dropped,
    Excluded(Exclusion),
    Kept(Box<NormalizedEvent>),
}

/// Extracts domain fields (amounts, category, attendance) from event text.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, event: &RawEvent) -> ParsedFields;
}

/// Extractor that finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFieldExtractor;

impl FieldExtractor for NoopFieldExtractor {
    fn extract(&self, _event: &RawEvent) -> ParsedFields {
        ParsedFields::default()
    }
}

pub struct EventClassifier {
    rules: ExclusionRules,
    extractor: Arc<dyn FieldExtractor>,
}

impl EventClassifier {
    pub fn new(rules: ExclusionRules, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self { rules, extractor }
    }

    pub fn classify(&self, calendar_external_id: &str, raw: &RawEvent) -> Classification {
        let Some(external_id) = raw.id.as_deref().filter(|id| !id.trim().is_empty()) else {
            debug!(calendar_id = calendar_external_id, "Dropping item without id");
            return Classification::Dropped;
        };

        let excluded = |reason| {
            Classification::Excluded(Exclusion {
                calendar_external_id: calendar_external_id.to_string(),
                external_event_id: external_id.to_string(),
                reason,
            })
        };

        if raw.status.as_deref() == Some("cancelled") {
            return excluded(ExclusionReason::Cancelled);
        }

        if let Some(pattern) = self
            .rules
            .first_match(raw.summary.as_deref(), raw.description.as_deref())
        {
            return excluded(ExclusionReason::Pattern(pattern.to_string()));
        }

        let mut fields = self.extractor.extract(raw);
        if fields.expected_amount.is_none() && fields.paid_amount.is_some() {
            fields.expected_amount = fields.paid_amount;
        }

        Classification::Kept(Box::new(NormalizedEvent {
            calendar_external_id: calendar_external_id.to_string(),
            external_id: external_id.to_string(),
            status: raw.status.clone(),
            event_type: raw.event_type.clone(),
            summary: raw.summary.clone(),
            description: raw.description.clone(),
            location: raw.location.clone(),
            visibility: raw.visibility.clone(),
            html_link: raw.html_link.clone(),
            recurring_event_id: raw.recurring_event_id.clone(),
            start: EventTime::from_raw(raw.start.as_ref()),
            end: EventTime::from_raw(raw.end.as_ref()),
            remote_created_at: parse_timestamp(raw.created.as_deref()),
            remote_updated_at: parse_timestamp(raw.updated.as_deref()),
            fields,
        }))
    }
}
