// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical activity model shared by every provider.

use crate::models::{Provider, Stream, StreamType};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One physical exercise session.
///
/// `(provider, provider_activity_id)` identifies the activity across
/// re-ingestion. Stream presence flags are derived from `streams` on read
/// and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Assigned by the store on first persistence
    pub id: Option<i64>,
    pub provider: Provider,
    /// Provider's own activity ID (unique within the provider)
    pub provider_activity_id: u64,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: u32,
    /// Elapsed time in seconds
    pub duration: u32,
    /// At most one stream per stream type
    pub streams: Vec<Stream>,
}

impl Activity {
    /// Create an activity with an empty stream set.
    pub fn new(
        provider: Provider,
        provider_activity_id: u64,
        distance: f64,
        moving_time: u32,
        duration: u32,
    ) -> Self {
        Self {
            id: None,
            provider,
            provider_activity_id,
            distance,
            moving_time,
            duration,
            streams: Vec::new(),
        }
    }

    /// Replace the whole stream set.
    ///
    /// A later stream of the same type replaces an earlier one and takes its
    /// position at the end. Every attached stream is linked to this activity.
    /// Returns how many streams were dropped as duplicates.
    pub fn attach_streams(&mut self, streams: Vec<Stream>) -> usize {
        let mut attached: Vec<Stream> = Vec::with_capacity(streams.len());
        let mut replaced = 0;

        for mut stream in streams {
            if let Some(pos) = attached
                .iter()
                .position(|s| s.stream_type == stream.stream_type)
            {
                tracing::warn!(
                    provider = %self.provider,
                    activity_id = self.provider_activity_id,
                    stream_type = %stream.stream_type,
                    "Duplicate stream type, keeping the later one"
                );
                attached.remove(pos);
                replaced += 1;
            }
            stream.activity_id = self.id;
            attached.push(stream);
        }

        self.streams = attached;
        replaced
    }

    pub fn stream(&self, stream_type: StreamType) -> Option<&Stream> {
        self.streams.iter().find(|s| s.stream_type == stream_type)
    }

    pub fn has_stream(&self, stream_type: StreamType) -> bool {
        self.stream(stream_type).is_some()
    }

    pub fn has_heartrate_stream(&self) -> bool {
        self.has_stream(StreamType::Heartrate)
    }

    pub fn has_watts_stream(&self) -> bool {
        self.has_stream(StreamType::Watts)
    }

    pub fn has_latlng_stream(&self) -> bool {
        self.has_stream(StreamType::Latlng)
    }

    /// Presence flag for every canonical stream type.
    pub fn stream_flags(&self) -> StreamFlags {
        StreamFlags::from_types(self.streams.iter().map(|s| s.stream_type))
    }

    /// Scalar fields plus derived flags, without the sample data.
    pub fn summary(&self) -> ActivitySummary {
        ActivitySummary {
            id: self.id,
            provider: self.provider,
            provider_activity_id: self.provider_activity_id,
            distance: self.distance,
            moving_time: self.moving_time,
            duration: self.duration,
            flags: self.stream_flags(),
        }
    }
}

/// Derived "has stream" flags, one per canonical stream type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct StreamFlags {
    pub has_time_stream: bool,
    pub has_distance_stream: bool,
    pub has_latlng_stream: bool,
    pub has_altitude_stream: bool,
    pub has_velocity_smooth_stream: bool,
    pub has_heartrate_stream: bool,
    pub has_cadence_stream: bool,
    pub has_watts_stream: bool,
    pub has_temp_stream: bool,
    pub has_moving_stream: bool,
    pub has_grade_smooth_stream: bool,
}

impl StreamFlags {
    pub fn from_types<I>(types: I) -> Self
    where
        I: IntoIterator<Item = StreamType>,
    {
        let mut flags = Self::default();
        for t in types {
            let flag = match t {
                StreamType::Time => &mut flags.has_time_stream,
                StreamType::Distance => &mut flags.has_distance_stream,
                StreamType::Latlng => &mut flags.has_latlng_stream,
                StreamType::Altitude => &mut flags.has_altitude_stream,
                StreamType::VelocitySmooth => &mut flags.has_velocity_smooth_stream,
                StreamType::Heartrate => &mut flags.has_heartrate_stream,
                StreamType::Cadence => &mut flags.has_cadence_stream,
                StreamType::Watts => &mut flags.has_watts_stream,
                StreamType::Temp => &mut flags.has_temp_stream,
                StreamType::Moving => &mut flags.has_moving_stream,
                StreamType::GradeSmooth => &mut flags.has_grade_smooth_stream,
            };
            *flag = true;
        }
        flags
    }
}

/// Activity listing row for the CLI and downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub struct ActivitySummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub id: Option<i64>,
    pub provider: Provider,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub provider_activity_id: u64,
    pub distance: f64,
    pub moving_time: u32,
    pub duration: u32,
    #[serde(flatten)]
    pub flags: StreamFlags,
}
