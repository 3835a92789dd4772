//! Migration to create the event_records table.
//!
//! Local projection of remote calendar events. The composite
//! `(calendar_id, external_event_id)` key is unique so repeated passes upsert
//! instead of duplicating rows.

use sea_orm_migration::prelude::*;

use crate::m2025_01_10_000001_create_calendar_sources::CalendarSources;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventRecords::CalendarId).integer().not_null())
                    .col(
                        ColumnDef::new(EventRecords::ExternalEventId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventRecords::Status).text().null())
                    .col(ColumnDef::new(EventRecords::EventType).text().null())
                    .col(ColumnDef::new(EventRecords::Summary).text().null())
                    .col(ColumnDef::new(EventRecords::Description).text().null())
                    .col(ColumnDef::new(EventRecords::Location).text().null())
                    .col(ColumnDef::new(EventRecords::Visibility).text().null())
                    .col(ColumnDef::new(EventRecords::HtmlLink).text().null())
                    .col(ColumnDef::new(EventRecords::RecurringEventId).text().null())
                    .col(ColumnDef::new(EventRecords::StartDate).date().null())
                    .col(
                        ColumnDef::new(EventRecords::StartDateTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(EventRecords::StartTimeZone).text().null())
                    .col(ColumnDef::new(EventRecords::EndDate).date().null())
                    .col(
                        ColumnDef::new(EventRecords::EndDateTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(EventRecords::EndTimeZone).text().null())
                    .col(
                        ColumnDef::new(EventRecords::RemoteCreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EventRecords::RemoteUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(EventRecords::ExpectedAmount).double().null())
                    .col(ColumnDef::new(EventRecords::PaidAmount).double().null())
                    .col(ColumnDef::new(EventRecords::Category).text().null())
                    .col(ColumnDef::new(EventRecords::Attendance).text().null())
                    .col(
                        ColumnDef::new(EventRecords::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EventRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_records_calendar_id")
                            .from(EventRecords::Table, EventRecords::CalendarId)
                            .to(CalendarSources::Table, CalendarSources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_records_calendar_external")
                    .table(EventRecords::Table)
                    .col(EventRecords::CalendarId)
                    .col(EventRecords::ExternalEventId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_event_records_calendar_external")
                    .table(EventRecords::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(EventRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EventRecords {
    Table,
    Id,
    CalendarId,
    ExternalEventId,
    Status,
    EventType,
    Summary,
    Description,
    Location,
    Visibility,
    HtmlLink,
    RecurringEventId,
    StartDate,
    StartDateTime,
    StartTimeZone,
    EndDate,
    EndDateTime,
    EndTimeZone,
    RemoteCreatedAt,
    RemoteUpdatedAt,
    ExpectedAmount,
    PaidAmount,
    Category,
    Attendance,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}
