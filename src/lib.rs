//! # calsync
//!
//! Incremental synchronization of remote calendars into a local relational
//! store: paginated fetching with retry and cursor resumption, exclusion
//! rules, field-level diffing and a guarded periodic scheduler.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod provider;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod telemetry;
pub use migration;
