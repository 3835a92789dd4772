//! Event record entity model
//!
//! Local projection of a remote calendar event. Rows are keyed by
//! `(calendar_id, external_event_id)`; start and end are stored either as a
//! date (all-day events) or as a timestamp with its time zone.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Locally stored calendar event
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "event_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owning calendar (foreign key to calendar_sources.id)
    pub calendar_id: i32,

    /// Provider-assigned event identifier (unique per calendar)
    pub external_event_id: String,

    pub status: Option<String>,
    pub event_type: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub visibility: Option<String>,
    pub html_link: Option<String>,
    pub recurring_event_id: Option<String>,

    pub start_date: Option<Date>,
    pub start_date_time: Option<DateTimeWithTimeZone>,
    pub start_time_zone: Option<String>,

    pub end_date: Option<Date>,
    pub end_date_time: Option<DateTimeWithTimeZone>,
    pub end_time_zone: Option<String>,

    /// Creation timestamp reported by the provider
    pub remote_created_at: Option<DateTimeWithTimeZone>,

    /// Last-modified timestamp reported by the provider
    pub remote_updated_at: Option<DateTimeWithTimeZone>,

    /// Amount parsed from the event text by the field extractor
    #[sea_orm(column_type = "Double", nullable)]
    pub expected_amount: Option<f64>,

    #[sea_orm(column_type = "Double", nullable)]
    pub paid_amount: Option<f64>,

    pub category: Option<String>,
    pub attendance: Option<String>,

    /// When this row was last written by a sync pass
    pub last_synced_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::calendar_source::Entity",
        from = "Column::CalendarId",
        to = "super::calendar_source::Column::Id",
        on_delete = "Cascade"
    )]
    CalendarSource,
}

impl Related<super::calendar_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CalendarSource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
