//! # Data Models
//!
//! SeaORM entities backing the local event store.

pub mod app_setting;
pub mod calendar_source;
pub mod event_record;

pub use app_setting::Entity as AppSetting;
pub use calendar_source::Entity as CalendarSource;
pub use event_record::Entity as EventRecord;
