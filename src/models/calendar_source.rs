//! Calendar source entity model
//!
//! This module contains the SeaORM entity model for the calendar_sources table,
//! which tracks every remote calendar together with its resumption cursor.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// A remote calendar known to the local store
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "calendar_sources")]
pub struct Model {
    /// Internal identifier (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Provider-assigned calendar identifier (unique)
    #[sea_orm(unique)]
    pub external_id: String,

    /// Human-readable calendar name (optional)
    pub display_name: Option<String>,

    /// Opaque sync token returned by the provider after the last complete pass
    pub resumption_cursor: Option<String>,

    /// Timestamp of the last successful pass
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_record::Entity")]
    EventRecords,
}

impl Related<super::event_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
