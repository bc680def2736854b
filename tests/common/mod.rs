// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde_json::{json, Value};
use stride::db::SqliteDb;
use stride::providers::strava::{activity_from_value, streams_from_value};
use stride::providers::{RawActivity, RawStream};

/// Create an in-memory store with the schema applied.
#[allow(dead_code)]
pub async fn test_db() -> SqliteDb {
    SqliteDb::open("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite")
}

/// Create a file-backed store in a temp directory (multiple connections).
#[allow(dead_code)]
pub async fn test_file_db(dir: &tempfile::TempDir) -> SqliteDb {
    let url = format!("sqlite:{}", dir.path().join("stride-test.db").display());
    SqliteDb::open(&url)
        .await
        .expect("Failed to open file-backed SQLite")
}

/// Strava activity JSON with the required fields.
#[allow(dead_code)]
pub fn strava_activity_json(id: u64, distance: f64, moving_time: u32, elapsed_time: u32) -> Value {
    json!({
        "id": id,
        "name": "Morning Run",
        "sport_type": "Run",
        "start_date": "2024-05-01T06:30:00Z",
        "distance": distance,
        "moving_time": moving_time,
        "elapsed_time": elapsed_time,
        "has_heartrate": true
    })
}

/// Parse a Strava activity fixture into a raw payload.
#[allow(dead_code)]
pub fn raw_activity(value: Value) -> RawActivity {
    RawActivity::from(activity_from_value(value).expect("valid activity fixture"))
}

/// Parse a Strava streams fixture into raw payloads.
#[allow(dead_code)]
pub fn raw_streams(value: Value) -> Vec<RawStream> {
    streams_from_value(value)
        .expect("valid streams fixture")
        .into_iter()
        .map(RawStream::from)
        .collect()
}
