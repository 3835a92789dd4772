//! Application setting entity model
//!
//! Key/value rows holding mutable runtime settings as JSON.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Key for the dynamic exclusion pattern list.
pub const EXCLUSION_PATTERNS_KEY: &str = "sync.exclusion_patterns";

/// Key for the timestamp of the last scheduler-triggered run.
pub const LAST_RUN_AT_KEY: &str = "sync.last_run_at";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "app_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub value: JsonValue,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
