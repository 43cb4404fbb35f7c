//! Test fixtures shared by the integration tests
//!
//! Every test opens its own store, so fixtures never share state.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rec_api::{
    http_transport::{create_router, AppState},
    observations::{quantity::kinds, Observation, SensorObservation},
    storage::{self, Database},
    RecService,
};
use serde_json::json;
use std::sync::Arc;

/// Store URLs every backend-generic test runs against
pub const MEMORY_URL: &str = "memory://";
pub const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

pub async fn open_store(url: &str) -> Arc<dyn Database> {
    storage::connect(url, 1).await.expect("store should open")
}

/// File-backed SQLite store with a real multi-connection pool. Keep `dir`
/// alive for as long as the store is used.
pub async fn file_store(dir: &tempfile::TempDir, max_connections: u32) -> Arc<dyn Database> {
    let url = format!("sqlite://{}", dir.path().join("rec.db").display());
    storage::connect(&url, max_connections)
        .await
        .expect("file store should open")
}

pub async fn test_router(url: &str) -> axum::Router {
    let state = Arc::new(AppState::new(RecService::new(open_store(url).await), None));
    create_router(state, std::time::Duration::from_secs(10))
}

/// Fixed reference time for gate scenarios
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

/// One-observation temperature batch for device `dev-1`, sensor `s-1`
pub fn temperature(value: f64, time: DateTime<Utc>) -> SensorObservation {
    SensorObservation::new("dev-1")
        .with_observation(Observation::new("s-1", kinds::TEMPERATURE, time).with_value(Some(value)))
}

/// `message.accepted` payload with a temperature measurement
pub fn message_accepted(sensor_id: &str, base_time: i64, value: f64) -> serde_json::Value {
    json!({
        "sensorID": "dev-1",
        "pack": [
            {"bn": "urn:oma:lwm2m:ext:3303", "bt": base_time, "n": "0", "vs": sensor_id},
            {"n": "5700", "v": value}
        ],
        "timestamp": "2024-03-01T08:00:00Z"
    })
}

pub fn building_updated(id: &str, energy: f64, power: f64) -> serde_json::Value {
    json!({
        "id": id,
        "type": "building",
        "subType": "",
        "building": {"energy": energy, "power": power}
    })
}
