// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! COROS payload models.
//!
//! NOTE: COROS API documentation is private. These follow the workout summary
//! fields COROS exposes publicly and will change once conversion is built.

use serde::{Deserialize, Serialize};

/// COROS workout summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorosWorkout {
    /// Unique workout ID
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Start time of workout (ISO 8601 or Unix timestamp)
    pub start_time: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// Sport/activity type ID
    pub sport_type: i32,
    /// Distance in meters
    #[serde(default)]
    pub distance: Option<f64>,
}

/// One per-second sample series of a COROS workout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorosSampleSeries {
    /// COROS channel name, e.g. "heartRate"
    pub data_type: String,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}
