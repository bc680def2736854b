// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite).

pub mod sqlite;

pub use sqlite::SqliteDb;

/// Table names as constants.
pub mod tables {
    pub const ACTIVITIES: &str = "activities";
    pub const STREAMS: &str = "streams";
    /// One row per sample (keyed by stream_id, idx)
    pub const STREAM_ENTRIES: &str = "stream_entries";
}
