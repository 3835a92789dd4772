//! SeaORM event store against in-memory SQLite.

mod test_utils;

use anyhow::Result;
use calsync::error::StoreError;
use calsync::models::app_setting::EXCLUSION_PATTERNS_KEY;
use calsync::store::EventStore;
use calsync::sync::{EventTime, NormalizedEvent, ParsedFields};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use test_utils::setup_test_store;

fn standup(calendar: &str) -> NormalizedEvent {
    NormalizedEvent {
        calendar_external_id: calendar.to_string(),
        external_id: "evt-a".to_string(),
        status: Some("confirmed".to_string()),
        event_type: Some("default".to_string()),
        summary: Some("Standup".to_string()),
        description: None,
        location: Some("Room 1".to_string()),
        visibility: None,
        html_link: None,
        recurring_event_id: None,
        start: EventTime::DateTime {
            at: Utc
                .with_ymd_and_hms(2024, 1, 2, 9, 0, 0)
                .unwrap()
                .fixed_offset(),
            time_zone: Some("UTC".to_string()),
        },
        end: EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()),
        remote_created_at: None,
        remote_updated_at: Some(Utc.with_ymd_and_hms(2023, 12, 20, 8, 0, 0).unwrap()),
        fields: ParsedFields {
            expected_amount: Some(25.5),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn calendar_upsert_is_idempotent_and_renames() -> Result<()> {
    let store = setup_test_store().await?;

    let first = store.upsert_calendar("cal-1", None).await?;
    let again = store.upsert_calendar("cal-1", None).await?;
    assert_eq!(first.id, again.id);
    assert!(again.display_name.is_none());

    let renamed = store.upsert_calendar("cal-1", Some("Team")).await?;
    assert_eq!(renamed.id, first.id);
    assert_eq!(renamed.display_name.as_deref(), Some("Team"));

    // Absent name keeps the existing one.
    let kept = store.upsert_calendar("cal-1", None).await?;
    assert_eq!(kept.display_name.as_deref(), Some("Team"));

    assert!(store.find_calendar("cal-2").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn cursor_and_sync_stamp_round_trip() -> Result<()> {
    let store = setup_test_store().await?;
    let calendar = store.upsert_calendar("cal-1", None).await?;

    store.set_cursor(calendar.id, Some("tok-1")).await?;
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    store.mark_synced(calendar.id, at).await?;

    let stored = store.find_calendar("cal-1").await?.expect("calendar row");
    assert_eq!(stored.resumption_cursor.as_deref(), Some("tok-1"));
    assert_eq!(stored.last_synced_at.map(|t| t.with_timezone(&Utc)), Some(at));

    store.set_cursor(calendar.id, None).await?;
    let cleared = store.find_calendar("cal-1").await?.expect("calendar row");
    assert!(cleared.resumption_cursor.is_none());

    assert!(matches!(
        store.set_cursor(calendar.id + 100, Some("x")).await,
        Err(StoreError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn events_insert_update_and_delete() -> Result<()> {
    let store = setup_test_store().await?;
    let calendar = store.upsert_calendar("cal-1", None).await?;
    let synced_at = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

    let mut event = standup("cal-1");
    store.insert_event(calendar.id, &event, synced_at).await?;

    let stored = store
        .find_event(calendar.id, "evt-a")
        .await?
        .expect("inserted");
    assert_eq!(stored.summary.as_deref(), Some("Standup"));
    assert_eq!(stored.start_time_zone.as_deref(), Some("UTC"));
    assert_eq!(stored.end_date, NaiveDate::from_ymd_opt(2024, 1, 3));
    assert!(stored.end_date_time.is_none());
    assert_eq!(stored.expected_amount, Some(25.5));

    event.summary = Some("Retro".to_string());
    store.update_event(stored.id, &event, synced_at).await?;
    let updated = store
        .find_event(calendar.id, "evt-a")
        .await?
        .expect("still present");
    assert_eq!(updated.id, stored.id);
    assert_eq!(updated.summary.as_deref(), Some("Retro"));

    assert!(store.delete_event(calendar.id, "evt-a").await?);
    assert!(!store.delete_event(calendar.id, "evt-a").await?);
    assert!(store.find_event(calendar.id, "evt-a").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_insert_overwrites_instead_of_failing() -> Result<()> {
    let store = setup_test_store().await?;
    let calendar = store.upsert_calendar("cal-1", None).await?;
    let synced_at = Utc::now();

    let mut event = standup("cal-1");
    store.insert_event(calendar.id, &event, synced_at).await?;
    event.location = Some("Room 2".to_string());
    store.insert_event(calendar.id, &event, synced_at).await?;

    let stored = store
        .find_event(calendar.id, "evt-a")
        .await?
        .expect("single row");
    assert_eq!(stored.location.as_deref(), Some("Room 2"));
    Ok(())
}

#[tokio::test]
async fn same_event_id_in_two_calendars_is_independent() -> Result<()> {
    let store = setup_test_store().await?;
    let one = store.upsert_calendar("cal-1", None).await?;
    let two = store.upsert_calendar("cal-2", None).await?;
    let synced_at = Utc::now();

    store
        .insert_event(one.id, &standup("cal-1"), synced_at)
        .await?;
    store
        .insert_event(two.id, &standup("cal-2"), synced_at)
        .await?;

    assert!(store.delete_event(one.id, "evt-a").await?);
    assert!(store.find_event(two.id, "evt-a").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn settings_are_upserted() -> Result<()> {
    let store = setup_test_store().await?;
    assert!(store.get_setting(EXCLUSION_PATTERNS_KEY).await?.is_none());

    store
        .set_setting(EXCLUSION_PATTERNS_KEY, json!(["lunch"]))
        .await?;
    store
        .set_setting(EXCLUSION_PATTERNS_KEY, json!("lunch\nprivate"))
        .await?;

    assert_eq!(
        store.get_setting(EXCLUSION_PATTERNS_KEY).await?,
        Some(json!("lunch\nprivate"))
    );
    Ok(())
}
