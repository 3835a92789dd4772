//! # Sync Engine
//!
//! Classification, diffing and upserting of remote events, driven per
//! calendar by the [`SyncOrchestrator`].

pub mod classifier;
pub mod diff;
pub mod event;
pub mod exclusions;
pub mod orchestrator;
pub mod outcome;
pub mod upsert;
pub mod window;

pub use classifier::{
    Classification, EventClassifier, Exclusion, ExclusionReason, FieldExtractor,
    NoopFieldExtractor,
};
pub use diff::{FieldChange, diff_fields};
pub use event::{EventTime, NormalizedEvent, ParsedFields};
pub use exclusions::{ExclusionRules, load_exclusions};
pub use orchestrator::SyncOrchestrator;
pub use outcome::{
    CalendarReport, CalendarTarget, DetailKind, DetailLog, RunSummary, SyncMode, SyncOutcome,
};
pub use upsert::UpsertEngine;
pub use window::SyncWindow;
