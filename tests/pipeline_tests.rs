//! End-to-end ingestion tests: decoding, normalization and the
//! deduplication gate against every store backend.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rec_api::{
    envelopes::{FUNCTION_UPDATED, MESSAGE_ACCEPTED},
    observations::{quantity::kinds, Observation, SensorObservation},
    storage::{
        entities::{BUILDING_TYPE, SENSOR_TYPE, SPACE_TYPE},
        AppendSummary, Database, Entity, ObservationQuery, Page,
    },
    RecError, RecService,
};
use rstest::*;
use std::sync::Arc;

mod common;
use common::*;

async fn stored_values(db: &dyn Database, sensor_id: &str) -> Vec<Option<f64>> {
    let query = ObservationQuery {
        sensor_id: sensor_id.to_string(),
        starting: at(-3600),
        ending: at(3600),
        page: Page::new(0, 100),
    };
    let (_, observations) = db.get_observations(&query).await.unwrap();
    observations.iter().map(|o| o.value).collect()
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_gate_suppresses_unchanged_values_in_window(#[case] url: &str) {
    let db = open_store(url).await;

    let inserted = |n| AppendSummary { inserted: n, suppressed: 1 - n };
    assert_eq!(db.add_observation(&temperature(42.0, t0())).await.unwrap(), inserted(1));
    assert_eq!(db.add_observation(&temperature(42.0, at(30))).await.unwrap(), inserted(0));
    assert_eq!(db.add_observation(&temperature(43.0, at(30))).await.unwrap(), inserted(1));
    // latest in-window value is 43, so 42 is a change again
    assert_eq!(db.add_observation(&temperature(42.0, at(45))).await.unwrap(), inserted(1));

    assert_eq!(
        stored_values(db.as_ref(), "s-1").await,
        vec![Some(42.0), Some(43.0), Some(42.0)]
    );
}

#[rstest]
#[case::memory(MEMORY_URL, 61)]
#[case::sqlite(SQLITE_MEMORY_URL, 61)]
#[case::memory_boundary(MEMORY_URL, 60)]
#[case::sqlite_boundary(SQLITE_MEMORY_URL, 60)]
#[tokio::test]
async fn test_gate_persists_identical_value_outside_window(#[case] url: &str, #[case] later: i64) {
    let db = open_store(url).await;

    db.add_observation(&temperature(42.0, t0())).await.unwrap();
    let summary = db.add_observation(&temperature(42.0, at(later))).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(stored_values(db.as_ref(), "s-1").await.len(), 2);
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_gate_series_are_independent(#[case] url: &str) {
    let db = open_store(url).await;
    db.add_observation(&temperature(42.0, t0())).await.unwrap();

    let other_device = SensorObservation::new("dev-2")
        .with_observation(Observation::new("s-1", kinds::TEMPERATURE, at(5)).with_value(Some(42.0)));
    let other_kind = SensorObservation::new("dev-1")
        .with_observation(Observation::new("s-1", "RelativeHumidity", at(5)).with_value(Some(42.0)));

    assert_eq!(db.add_observation(&other_device).await.unwrap().inserted, 1);
    assert_eq!(db.add_observation(&other_kind).await.unwrap().inserted, 1);
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_gate_sees_earlier_rows_of_the_same_batch(#[case] url: &str) {
    let db = open_store(url).await;
    let batch = SensorObservation::new("dev-1")
        .with_observation(Observation::new("s-1", kinds::TEMPERATURE, t0()).with_value(Some(20.0)))
        .with_observation(Observation::new("s-1", kinds::TEMPERATURE, at(10)).with_value(Some(20.0)));

    let summary = db.add_observation(&batch).await.unwrap();
    assert_eq!(summary, AppendSummary { inserted: 1, suppressed: 1 });
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_failed_batch_stores_nothing(#[case] url: &str) {
    let db = open_store(url).await;
    db.add_observation(&temperature(1.0, t0())).await.unwrap();
    db.add_observation(&temperature(2.0, at(10))).await.unwrap();

    // the replay of 1.0@T0 passes the gate (latest is 2.0) and hits the
    // uniqueness constraint, taking the humidity row down with it
    let batch = SensorObservation::new("dev-1")
        .with_observation(Observation::new("s-1", "RelativeHumidity", at(20)).with_value(Some(55.0)))
        .with_observation(Observation::new("s-1", kinds::TEMPERATURE, t0()).with_value(Some(1.0)));

    let err = db.add_observation(&batch).await.unwrap_err();
    assert!(matches!(err, RecError::Database(_)));
    assert_eq!(stored_values(db.as_ref(), "s-1").await, vec![Some(1.0), Some(2.0)]);
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_message_accepted_is_rounded_and_deduplicated(#[case] url: &str) {
    let service = RecService::new(open_store(url).await);
    let event = message_accepted("S1", 1_700_000_000, 12.345678).to_string();

    let first = service.handle_event(MESSAGE_ACCEPTED, event.as_bytes()).await.unwrap();
    let replay = service.handle_event(MESSAGE_ACCEPTED, event.as_bytes()).await.unwrap();
    assert_eq!(first.inserted, 1);
    assert_eq!(replay.suppressed, 1);

    let query = ObservationQuery {
        sensor_id: "S1".to_string(),
        starting: chrono::DateTime::<Utc>::UNIX_EPOCH,
        ending: Utc::now(),
        page: Page::default(),
    };
    let (total, observations) = service.get_observations(&query).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(observations[0].value, Some(12.3));
    assert_eq!(observations[0].quantity_kind, kinds::TEMPERATURE);
    assert_eq!(
        observations[0].observation_time.to_rfc3339(),
        "2023-11-14T22:13:20+00:00"
    );
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_building_batch_is_stored_together(#[case] url: &str) {
    let service = RecService::new(open_store(url).await);
    let event = building_updated("b-1", 10.0, 5.0).to_string();

    let summary = service.handle_event(FUNCTION_UPDATED, event.as_bytes()).await.unwrap();
    assert_eq!(summary, AppendSummary { inserted: 2, suppressed: 0 });

    let query = ObservationQuery {
        sensor_id: "b-1".to_string(),
        starting: Utc::now() - Duration::minutes(5),
        ending: Utc::now() + Duration::minutes(5),
        page: Page::default(),
    };
    let (_, observations) = service.get_observations(&query).await.unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0].observation_time, observations[1].observation_time);

    let mut kinds_stored: Vec<_> = observations.iter().map(|o| o.quantity_kind.clone()).collect();
    kinds_stored.sort();
    assert_eq!(kinds_stored, vec![kinds::ENERGY.to_string(), kinds::POWER.to_string()]);

    // same values again within the window
    let replay = service.handle_event(FUNCTION_UPDATED, event.as_bytes()).await.unwrap();
    assert_eq!(replay, AppendSummary { inserted: 0, suppressed: 2 });
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_observation_range_is_inclusive_and_paged(#[case] url: &str) {
    let db = open_store(url).await;
    for (i, value) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
        db.add_observation(&temperature(value, at(i as i64 * 120)))
            .await
            .unwrap();
    }

    let query = ObservationQuery {
        sensor_id: "s-1".to_string(),
        starting: at(120),
        ending: at(480),
        page: Page::new(1, 2),
    };
    let (total, observations) = db.get_observations(&query).await.unwrap();

    assert_eq!(total, 4);
    let values: Vec<_> = observations.iter().map(|o| o.value).collect();
    assert_eq!(values, vec![Some(4.0), Some(5.0)]);
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_concurrent_batches_never_duplicate(#[case] url: &str) {
    let service = RecService::new(open_store(url).await);
    let event = message_accepted("S1", 1_700_000_000, 21.5).to_string();

    let results = futures::future::join_all(
        (0..8).map(|_| service.handle_event(MESSAGE_ACCEPTED, event.as_bytes())),
    )
    .await;

    let inserted: usize = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|s| s.inserted)
        .sum();
    assert_eq!(inserted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_on_pooled_sqlite_insert_once() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(RecService::new(file_store(&dir, 5).await));
    let event = message_accepted("S1", 1_700_000_000, 21.5).to_string();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = Arc::clone(&service);
            let event = event.clone();
            tokio::spawn(async move { service.handle_event(MESSAGE_ACCEPTED, event.as_bytes()).await })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        let summary = handle.await.unwrap().expect("replay should be suppressed, not fail");
        inserted += summary.inserted;
    }
    assert_eq!(inserted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_batches_for_different_devices_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_store(&dir, 5).await;

    let handles: Vec<_> = (0..160)
        .map(|i| {
            let db = Arc::clone(&db);
            let batch = SensorObservation::new(format!("dev-{}", i % 8)).with_observation(
                Observation::new("s", kinds::TEMPERATURE, at(i as i64)).with_value(Some(i as f64)),
            );
            tokio::spawn(async move { db.add_observation(&batch).await })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        inserted += handle.await.unwrap().expect("batch should be stored").inserted;
    }
    assert_eq!(inserted, 160);

    let query = ObservationQuery {
        sensor_id: "s".to_string(),
        starting: at(-3600),
        ending: at(3600),
        page: Page::new(0, 500),
    };
    let (total, _) = db.get_observations(&query).await.unwrap();
    assert_eq!(total, 160);
}

#[rstest]
#[case::memory(MEMORY_URL, 1 << 62)]
#[case::sqlite(SQLITE_MEMORY_URL, 1 << 62)]
#[case::memory_saturated(MEMORY_URL, usize::MAX)]
#[case::sqlite_saturated(SQLITE_MEMORY_URL, usize::MAX)]
#[tokio::test]
async fn test_paging_past_the_end_is_empty(#[case] url: &str, #[case] page: usize) {
    let db = open_store(url).await;
    for (i, value) in [0.0, 1.0, 2.0].into_iter().enumerate() {
        db.add_observation(&temperature(value, at(i as i64 * 120)))
            .await
            .unwrap();
    }
    db.add_entity(&Entity::space("sp-1")).await.unwrap();
    db.add_entity(&Entity::space("sp-2")).await.unwrap();

    let query = ObservationQuery {
        sensor_id: "s-1".to_string(),
        starting: at(-3600),
        ending: at(3600),
        page: Page::new(page, 2),
    };
    let (total, observations) = db.get_observations(&query).await.unwrap();
    assert_eq!(total, 3);
    assert!(observations.is_empty());

    let (total, spaces) = db.get_entities(SPACE_TYPE, Page::new(page, 2)).await.unwrap();
    assert_eq!(total, 2);
    assert!(spaces.is_empty());

    // an oversized page returns everything rather than wrapping to "no limit"
    let query = ObservationQuery { page: Page::new(0, usize::MAX), ..query };
    let (_, observations) = db.get_observations(&query).await.unwrap();
    assert_eq!(observations.len(), 3);
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_entity_hierarchy(#[case] url: &str) {
    let db = open_store(url).await;
    db.add_entity(&Entity::space("sp-1")).await.unwrap();
    db.add_entity(&Entity::building("b-1").part_of("sp-1", SPACE_TYPE)).await.unwrap();
    db.add_entity(&Entity::building("b-2").part_of("sp-1", SPACE_TYPE)).await.unwrap();
    db.add_entity(&Entity::sensor("s-2").part_of("b-2", BUILDING_TYPE)).await.unwrap();
    db.add_entity(&Entity::sensor("s-1").part_of("b-1", BUILDING_TYPE)).await.unwrap();

    let sensor = db.get_entity("s-1", SENSOR_TYPE).await.unwrap();
    assert_eq!(sensor.is_part_of.unwrap().id, "b-1");

    let space = db.get_entity("sp-1", SPACE_TYPE).await.unwrap();
    let sensors = db.get_child_entities(&space, SENSOR_TYPE).await.unwrap();
    let ids: Vec<_> = sensors.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["s-1", "s-2"]);

    let (total, buildings) = db.get_entities(BUILDING_TYPE, Page::new(1, 1)).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(buildings[0].id, "b-2");

    let err = db.get_entity("missing", SENSOR_TYPE).await.unwrap_err();
    assert!(matches!(err, RecError::NotFound(_)));
}

#[rstest]
#[case::memory(MEMORY_URL)]
#[case::sqlite(SQLITE_MEMORY_URL)]
#[tokio::test]
async fn test_child_traversal_terminates_on_cycles(#[case] url: &str) {
    let db = open_store(url).await;
    db.add_entity(&Entity::space("sp-1")).await.unwrap();
    db.add_entity(&Entity::building("b-1").part_of("sp-1", SPACE_TYPE)).await.unwrap();
    db.add_entity(&Entity::sensor("s-1").part_of("b-1", BUILDING_TYPE)).await.unwrap();
    // close the loop: the space becomes part of its own building
    db.add_entity(&Entity::space("sp-1").part_of("b-1", BUILDING_TYPE)).await.unwrap();

    let space = db.get_entity("sp-1", SPACE_TYPE).await.unwrap();
    let sensors = db.get_child_entities(&space, SENSOR_TYPE).await.unwrap();
    assert_eq!(sensors.len(), 1);
}
