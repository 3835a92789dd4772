//! # Local Event Store
//!
//! [`EventStore`] is the persistence seam used by the sync engine.
//! [`SeaOrmEventStore`] implements it on top of the SeaORM entities in
//! [`crate::models`], working against Postgres or SQLite.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::StoreError;
use crate::models::{
    AppSetting, CalendarSource, EventRecord, app_setting, calendar_source, event_record,
};
use crate::sync::event::NormalizedEvent;

/// Local persistence used by the sync engine.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create the calendar row on first sight; refresh its display name otherwise.
    async fn upsert_calendar(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<calendar_source::Model, StoreError>;

    async fn find_calendar(
        &self,
        external_id: &str,
    ) -> Result<Option<calendar_source::Model>, StoreError>;

    /// Replace (or clear) the stored resumption cursor.
    async fn set_cursor(&self, calendar_id: i32, cursor: Option<&str>) -> Result<(), StoreError>;

    async fn mark_synced(&self, calendar_id: i32, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn find_event(
        &self,
        calendar_id: i32,
        external_event_id: &str,
    ) -> Result<Option<event_record::Model>, StoreError>;

    async fn insert_event(
        &self,
        calendar_id: i32,
        event: &NormalizedEvent,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_event(
        &self,
        record_id: i32,
        event: &NormalizedEvent,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn delete_event(
        &self,
        calendar_id: i32,
        external_event_id: &str,
    ) -> Result<bool, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<JsonValue>, StoreError>;

    async fn set_setting(&self, key: &str, value: JsonValue) -> Result<(), StoreError>;
}

/// SeaORM-backed [`EventStore`].
#[derive(Debug, Clone)]
pub struct SeaOrmEventStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmEventStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Column values written for an event, shared by insert and update.
fn apply_event_fields(
    model: &mut event_record::ActiveModel,
    event: &NormalizedEvent,
    synced_at: DateTime<Utc>,
) {
    model.status = Set(event.status.clone());
    model.event_type = Set(event.event_type.clone());
    model.summary = Set(event.summary.clone());
    model.description = Set(event.description.clone());
    model.location = Set(event.location.clone());
    model.visibility = Set(event.visibility.clone());
    model.html_link = Set(event.html_link.clone());
    model.recurring_event_id = Set(event.recurring_event_id.clone());
    model.start_date = Set(event.start.date());
    model.start_date_time = Set(event.start.date_time());
    model.start_time_zone = Set(event.start.time_zone().map(str::to_string));
    model.end_date = Set(event.end.date());
    model.end_date_time = Set(event.end.date_time());
    model.end_time_zone = Set(event.end.time_zone().map(str::to_string));
    model.remote_created_at = Set(event.remote_created_at.map(|t| t.fixed_offset()));
    model.remote_updated_at = Set(event.remote_updated_at.map(|t| t.fixed_offset()));
    model.expected_amount = Set(event.fields.expected_amount);
    model.paid_amount = Set(event.fields.paid_amount);
    model.category = Set(event.fields.category.clone());
    model.attendance = Set(event.fields.attendance.clone());
    model.last_synced_at = Set(synced_at.fixed_offset());
    model.updated_at = Set(synced_at.fixed_offset());
}

/// Columns overwritten when an insert hits an existing `(calendar_id, external_event_id)`.
const UPSERT_COLUMNS: [event_record::Column; 21] = [
    event_record::Column::Status,
    event_record::Column::EventType,
    event_record::Column::Summary,
    event_record::Column::Description,
    event_record::Column::Location,
    event_record::Column::Visibility,
    event_record::Column::HtmlLink,
    event_record::Column::RecurringEventId,
    event_record::Column::StartDate,
    event_record::Column::StartDateTime,
    event_record::Column::StartTimeZone,
    event_record::Column::EndDate,
    event_record::Column::EndDateTime,
    event_record::Column::EndTimeZone,
    event_record::Column::RemoteCreatedAt,
    event_record::Column::RemoteUpdatedAt,
    event_record::Column::ExpectedAmount,
    event_record::Column::PaidAmount,
    event_record::Column::Category,
    event_record::Column::Attendance,
    event_record::Column::LastSyncedAt,
];

#[async_trait]
impl EventStore for SeaOrmEventStore {
    async fn upsert_calendar(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<calendar_source::Model, StoreError> {
        if let Some(existing) = self.find_calendar(external_id).await? {
            let wants_rename =
                display_name.is_some_and(|name| existing.display_name.as_deref() != Some(name));
            if !wants_rename {
                return Ok(existing);
            }

            let mut active: calendar_source::ActiveModel = existing.into();
            active.display_name = Set(display_name.map(str::to_string));
            active.updated_at = Set(Utc::now().fixed_offset());
            return Ok(active.update(&*self.db).await?);
        }

        let now = Utc::now().fixed_offset();
        let active = calendar_source::ActiveModel {
            external_id: Set(external_id.to_string()),
            display_name: Set(display_name.map(str::to_string)),
            resumption_cursor: Set(None),
            last_synced_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // A concurrent writer may have created the row in the meantime.
        match CalendarSource::insert(active)
            .on_conflict(
                OnConflict::column(calendar_source::Column::ExternalId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(err) => return Err(err.into()),
        }

        debug!(calendar_id = external_id, "Registered calendar source");

        self.find_calendar(external_id)
            .await?
            .ok_or_else(|| StoreError::not_found("calendar", external_id))
    }

    async fn find_calendar(
        &self,
        external_id: &str,
    ) -> Result<Option<calendar_source::Model>, StoreError> {
        Ok(CalendarSource::find()
            .filter(calendar_source::Column::ExternalId.eq(external_id))
            .one(&*self.db)
            .await?)
    }

    async fn set_cursor(&self, calendar_id: i32, cursor: Option<&str>) -> Result<(), StoreError> {
        let result = CalendarSource::update_many()
            .col_expr(
                calendar_source::Column::ResumptionCursor,
                Expr::value(cursor.map(str::to_string)),
            )
            .col_expr(
                calendar_source::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(calendar_source::Column::Id.eq(calendar_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::not_found("calendar", calendar_id.to_string()));
        }
        Ok(())
    }

    async fn mark_synced(&self, calendar_id: i32, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = CalendarSource::update_many()
            .col_expr(
                calendar_source::Column::LastSyncedAt,
                Expr::value(Some(at.fixed_offset())),
            )
            .col_expr(
                calendar_source::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(calendar_source::Column::Id.eq(calendar_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::not_found("calendar", calendar_id.to_string()));
        }
        Ok(())
    }

    async fn find_event(
        &self,
        calendar_id: i32,
        external_event_id: &str,
    ) -> Result<Option<event_record::Model>, StoreError> {
        Ok(EventRecord::find()
            .filter(event_record::Column::CalendarId.eq(calendar_id))
            .filter(event_record::Column::ExternalEventId.eq(external_event_id))
            .one(&*self.db)
            .await?)
    }

    async fn insert_event(
        &self,
        calendar_id: i32,
        event: &NormalizedEvent,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut active = event_record::ActiveModel {
            calendar_id: Set(calendar_id),
            external_event_id: Set(event.external_id.clone()),
            created_at: Set(synced_at.fixed_offset()),
            ..Default::default()
        };
        apply_event_fields(&mut active, event, synced_at);

        EventRecord::insert(active)
            .on_conflict(
                OnConflict::columns([
                    event_record::Column::CalendarId,
                    event_record::Column::ExternalEventId,
                ])
                .update_columns(UPSERT_COLUMNS)
                .update_column(event_record::Column::UpdatedAt)
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        Ok(())
    }

    async fn update_event(
        &self,
        record_id: i32,
        event: &NormalizedEvent,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut active = event_record::ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(record_id),
            ..Default::default()
        };
        apply_event_fields(&mut active, event, synced_at);
        active.update(&*self.db).await?;
        Ok(())
    }

    async fn delete_event(
        &self,
        calendar_id: i32,
        external_event_id: &str,
    ) -> Result<bool, StoreError> {
        let result = EventRecord::delete_many()
            .filter(event_record::Column::CalendarId.eq(calendar_id))
            .filter(event_record::Column::ExternalEventId.eq(external_event_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
        Ok(AppSetting::find_by_id(key.to_string())
            .one(&*self.db)
            .await?
            .map(|setting| setting.value))
    }

    async fn set_setting(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
        let active = app_setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now().fixed_offset()),
        };

        AppSetting::insert(active)
            .on_conflict(
                OnConflict::column(app_setting::Column::Key)
                    .update_columns([app_setting::Column::Value, app_setting::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;
        Ok(())
    }
}
