//! Database migrations for the calendar sync engine.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_10_000001_create_calendar_sources;
mod m2025_01_10_000002_create_event_records;
mod m2025_01_10_000003_create_app_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_000001_create_calendar_sources::Migration),
            Box::new(m2025_01_10_000002_create_event_records::Migration),
            Box::new(m2025_01_10_000003_create_app_settings::Migration),
        ]
    }
}
