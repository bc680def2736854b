// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical stream model: one time-series channel of an activity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Canonical stream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "bindings/")
)]
pub enum StreamType {
    Time,
    Distance,
    Latlng,
    Altitude,
    VelocitySmooth,
    Heartrate,
    Cadence,
    Watts,
    Temp,
    Moving,
    GradeSmooth,
}

impl StreamType {
    pub const ALL: [StreamType; 11] = [
        StreamType::Time,
        StreamType::Distance,
        StreamType::Latlng,
        StreamType::Altitude,
        StreamType::VelocitySmooth,
        StreamType::Heartrate,
        StreamType::Cadence,
        StreamType::Watts,
        StreamType::Temp,
        StreamType::Moving,
        StreamType::GradeSmooth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Time => "time",
            StreamType::Distance => "distance",
            StreamType::Latlng => "latlng",
            StreamType::Altitude => "altitude",
            StreamType::VelocitySmooth => "velocity_smooth",
            StreamType::Heartrate => "heartrate",
            StreamType::Cadence => "cadence",
            StreamType::Watts => "watts",
            StreamType::Temp => "temp",
            StreamType::Moving => "moving",
            StreamType::GradeSmooth => "grade_smooth",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name that is not part of the canonical stream vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stream type: {0}")]
pub struct UnknownStreamType(pub String);

impl FromStr for StreamType {
    type Err = UnknownStreamType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownStreamType(s.to_string()))
    }
}

/// Sample position past the largest representable entry index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stream_type} stream has more than {} samples (position {position})", u32::MAX as u64 + 1)]
pub struct StreamTooLong {
    pub stream_type: StreamType,
    pub position: usize,
}

/// One named time-series channel, owned by exactly one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Assigned by the store on persistence
    pub id: Option<i64>,
    /// Owning activity, set when the stream is attached
    pub activity_id: Option<i64>,
    pub stream_type: StreamType,
    pub entries: Vec<StreamEntry>,
}

impl Stream {
    /// Build a stream from an ordered sequence of samples.
    ///
    /// Entry `i` gets `index == i`; nothing is reordered, deduplicated or skipped.
    /// Fails if a sample index does not fit the `u32` entry index.
    pub fn from_samples<I>(stream_type: StreamType, samples: I) -> Result<Self, StreamTooLong>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let entries = samples
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                Ok(StreamEntry {
                    index: Self::entry_index(stream_type, index)?,
                    stream_type,
                    value,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: None,
            activity_id: None,
            stream_type,
            entries,
        })
    }

    /// Entry index for the sample at `position`.
    pub fn entry_index(stream_type: StreamType, position: usize) -> Result<u32, StreamTooLong> {
        u32::try_from(position).map_err(|_| StreamTooLong {
            stream_type,
            position,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sample values in index order.
    pub fn values(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.entries.iter().map(|e| e.value)
    }
}

/// One sample of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Zero-based position in the source sequence
    pub index: u32,
    /// Copy of the parent stream's type
    pub stream_type: StreamType,
    /// `None` when the source had no reading at this position
    pub value: Option<f64>,
}
