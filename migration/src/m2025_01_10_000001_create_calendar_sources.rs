//! Migration to create the calendar_sources table.
//!
//! One row per tracked remote calendar, keyed by the provider-assigned
//! external identifier and carrying the resumption cursor between passes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CalendarSources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CalendarSources::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CalendarSources::ExternalId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CalendarSources::DisplayName).text().null())
                    .col(
                        ColumnDef::new(CalendarSources::ResumptionCursor)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CalendarSources::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CalendarSources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CalendarSources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_calendar_sources_external_id")
                    .table(CalendarSources::Table)
                    .col(CalendarSources::ExternalId)
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
                    .name("idx_calendar_sources_external_id")
                    .table(CalendarSources::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CalendarSources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum CalendarSources {
    Table,
    Id,
    ExternalId,
    DisplayName,
    ResumptionCursor,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}
