// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider payload models, validated at the boundary.
//!
//! Each provider keeps its own raw JSON shape. `RawActivity` and `RawStream`
//! wrap them so a converter can be picked at runtime by provider tag.

pub mod coros;
pub mod strava;

use crate::models::Provider;

pub use coros::{CorosSampleSeries, CorosWorkout};
pub use strava::{StravaActivity, StravaStream, StravaStreamType};

/// A provider activity payload.
#[derive(Debug, Clone)]
pub enum RawActivity {
    Strava(StravaActivity),
    Coros(CorosWorkout),
}

impl RawActivity {
    pub fn provider(&self) -> Provider {
        match self {
            RawActivity::Strava(_) => Provider::Strava,
            RawActivity::Coros(_) => Provider::Coros,
        }
    }
}

impl From<StravaActivity> for RawActivity {
    fn from(activity: StravaActivity) -> Self {
        RawActivity::Strava(activity)
    }
}

impl From<CorosWorkout> for RawActivity {
    fn from(workout: CorosWorkout) -> Self {
        RawActivity::Coros(workout)
    }
}

/// A provider stream payload.
#[derive(Debug, Clone)]
pub enum RawStream {
    Strava(StravaStream),
    Coros(CorosSampleSeries),
}

impl RawStream {
    pub fn provider(&self) -> Provider {
        match self {
            RawStream::Strava(_) => Provider::Strava,
            RawStream::Coros(_) => Provider::Coros,
        }
    }

    /// Provider's own tag for this stream.
    pub fn tag(&self) -> &str {
        match self {
            RawStream::Strava(s) => &s.stream_type,
            RawStream::Coros(s) => &s.data_type,
        }
    }
}

impl From<StravaStream> for RawStream {
    fn from(stream: StravaStream) -> Self {
        RawStream::Strava(stream)
    }
}

impl From<CorosSampleSeries> for RawStream {
    fn from(series: CorosSampleSeries) -> Self {
        RawStream::Coros(series)
    }
}

/// Parse raw JSON payloads for `provider` into validated payload models.
///
/// Used by the offline import path; the Strava client parses its responses
/// through the same functions.
pub fn parse_payloads(
    provider: Provider,
    activity_json: &str,
    streams_json: Option<&str>,
) -> Result<(RawActivity, Vec<RawStream>), crate::converters::ConvertError> {
    use crate::converters::ConvertError;

    match provider {
        Provider::Strava => {
            let activity = strava::parse_activity(activity_json)?;
            let streams = match streams_json {
                Some(json) => strava::parse_streams(json)
                    .map_err(|e| e.with_activity_id(activity.id))?
                    .into_iter()
                    .map(RawStream::from)
                    .collect(),
                None => Vec::new(),
            };
            Ok((RawActivity::from(activity), streams))
        }
        Provider::Coros => {
            let workout: CorosWorkout = serde_json::from_str(activity_json)
                .map_err(|e| ConvertError::invalid(Provider::Coros, "payload", e.to_string()))?;
            let series: Vec<CorosSampleSeries> = match streams_json {
                Some(json) => serde_json::from_str(json).map_err(|e| {
                    ConvertError::invalid(Provider::Coros, "streams", e.to_string())
                })?,
                None => Vec::new(),
            };
            Ok((
                RawActivity::from(workout),
                series.into_iter().map(RawStream::from).collect(),
            ))
        }
    }
}
