// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store behavior for converted activities: upsert, stream replacement and
//! cascade delete.

mod common;

use common::{raw_activity, raw_streams, strava_activity_json, test_db, test_file_db};
use serde_json::json;
use stride::converters::ConversionService;
use stride::db::tables;
use stride::models::{Activity, Provider, StreamFlags, StreamType};

fn convert(id: u64, streams: serde_json::Value) -> Activity {
    ConversionService::global()
        .process(
            "strava",
            &raw_activity(strava_activity_json(id, 5000.0, 1500, 1600)),
            &raw_streams(streams),
        )
        .expect("conversion should succeed")
}

#[tokio::test]
async fn test_reprocessing_replaces_stream_set() {
    let db = test_db().await;

    let first = convert(
        123,
        json!([
            {"type": "heartrate", "data": [100, 110, 120]},
            {"type": "time", "data": [0, 1, 2]}
        ]),
    );
    let saved_first = db.save_activity(&first).await.unwrap();

    let second = convert(123, json!([{"type": "watts", "data": [250, 260]}]));
    let saved_second = db.save_activity(&second).await.unwrap();

    // Same row, new streams only
    assert_eq!(saved_first.id, saved_second.id);

    let loaded = db.get_activity(Provider::Strava, 123).await.unwrap().unwrap();
    let types: Vec<StreamType> = loaded.streams.iter().map(|s| s.stream_type).collect();
    assert_eq!(types, vec![StreamType::Watts]);
    assert_eq!(
        loaded.streams[0].values().collect::<Vec<_>>(),
        vec![Some(250.0), Some(260.0)]
    );

    assert_eq!(db.count_rows(tables::ACTIVITIES).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAMS).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAM_ENTRIES).await.unwrap(), 2);
}

#[tokio::test]
async fn test_saving_twice_is_idempotent() {
    let db = test_db().await;
    let activity = convert(7, json!([{"type": "distance", "data": [0.0, 5.0, 10.0]}]));

    db.save_activity(&activity).await.unwrap();
    db.save_activity(&activity).await.unwrap();

    assert_eq!(db.count_rows(tables::ACTIVITIES).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAMS).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAM_ENTRIES).await.unwrap(), 3);

    let loaded = db.get_activity(Provider::Strava, 7).await.unwrap().unwrap();
    assert_eq!(loaded.streams[0].values().collect::<Vec<_>>().len(), 3);
}

#[tokio::test]
async fn test_scalar_fields_updated_on_resave() {
    let db = test_db().await;
    db.save_activity(&convert(8, json!([]))).await.unwrap();

    let mut updated = convert(8, json!([]));
    updated.distance = 5100.0;
    updated.moving_time = 1550;
    db.save_activity(&updated).await.unwrap();

    let loaded = db.get_activity(Provider::Strava, 8).await.unwrap().unwrap();
    assert_eq!(loaded.distance, 5100.0);
    assert_eq!(loaded.moving_time, 1550);
    assert_eq!(loaded.duration, 1600);
}

#[tokio::test]
async fn test_delete_cascades_to_streams() {
    let db = test_db().await;
    db.save_activity(&convert(
        55,
        json!([
            {"type": "heartrate", "data": [90, 91]},
            {"type": "cadence", "data": [80, 81]}
        ]),
    ))
    .await
    .unwrap();
    db.save_activity(&convert(56, json!([{"type": "time", "data": [0]}])))
        .await
        .unwrap();

    assert!(db.delete_activity(Provider::Strava, 55).await.unwrap());

    assert!(db.get_activity(Provider::Strava, 55).await.unwrap().is_none());
    assert_eq!(db.count_rows(tables::ACTIVITIES).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAMS).await.unwrap(), 1);
    assert_eq!(db.count_rows(tables::STREAM_ENTRIES).await.unwrap(), 1);

    assert!(!db.delete_activity(Provider::Strava, 55).await.unwrap());
}

#[tokio::test]
async fn test_list_derives_flags_from_stored_streams() {
    let db = test_db().await;
    db.save_activity(&convert(
        1,
        json!([
            {"type": "heartrate", "data": [90]},
            {"type": "velocity_smooth", "data": [2.5]}
        ]),
    ))
    .await
    .unwrap();
    db.save_activity(&convert(2, json!([]))).await.unwrap();

    let summaries = db.list_activities(10).await.unwrap();
    assert_eq!(summaries.len(), 2);

    let with_streams = summaries
        .iter()
        .find(|s| s.provider_activity_id == 1)
        .unwrap();
    assert!(with_streams.flags.has_heartrate_stream);
    assert!(with_streams.flags.has_velocity_smooth_stream);
    assert!(!with_streams.flags.has_watts_stream);

    let bare = summaries
        .iter()
        .find(|s| s.provider_activity_id == 2)
        .unwrap();
    assert_eq!(bare.flags, StreamFlags::default());

    assert_eq!(db.list_activities(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_saves_of_same_activity() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_file_db(&dir).await;

    let stream_sets = [
        json!([{"type": "heartrate", "data": [1, 2, 3]}]),
        json!([{"type": "watts", "data": [4, 5]}, {"type": "time", "data": [0, 1]}]),
        json!([{"type": "cadence", "data": [6]}]),
        json!([{"type": "temp", "data": [20, 21, 22, 23]}]),
    ];

    let handles: Vec<_> = stream_sets
        .into_iter()
        .map(|streams| {
            let db = db.clone();
            let activity = convert(999, streams);
            tokio::spawn(async move { db.save_activity(&activity).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Exactly one of the stream sets survives intact
    let loaded = db.get_activity(Provider::Strava, 999).await.unwrap().unwrap();
    let entries: usize = loaded.streams.iter().map(|s| s.entries.len()).sum();

    assert_eq!(db.count_rows(tables::ACTIVITIES).await.unwrap(), 1);
    assert_eq!(
        db.count_rows(tables::STREAMS).await.unwrap(),
        loaded.streams.len() as i64
    );
    assert_eq!(
        db.count_rows(tables::STREAM_ENTRIES).await.unwrap(),
        entries as i64
    );
    assert!(
        [1, 3, 4].contains(&entries),
        "unexpected surviving stream set: {:?}",
        loaded.streams
    );
}

#[tokio::test]
async fn test_long_stream_round_trip() {
    let db = test_db().await;
    let samples: Vec<serde_json::Value> = (0..3600)
        .map(|i| if i % 97 == 0 { json!(null) } else { json!(i) })
        .collect();
    let activity = convert(31, json!([{"type": "time", "data": samples}]));

    db.save_activity(&activity).await.unwrap();
    let loaded = db.get_activity(Provider::Strava, 31).await.unwrap().unwrap();

    assert_eq!(loaded.streams[0].entries.len(), 3600);
    assert_eq!(loaded.streams[0].entries[97].value, None);
    assert_eq!(loaded.streams[0].entries[3599].value, Some(3599.0));
    assert_eq!(
        loaded.streams[0].values().collect::<Vec<_>>(),
        activity.streams[0].values().collect::<Vec<_>>()
    );
}
