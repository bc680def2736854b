// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava payloads to canonical entities.

use super::{map_stream_type, ConvertError, Converter, UnmappedStreamPolicy};
use crate::models::{Activity, Provider, Stream, StreamType};
use crate::providers::{RawActivity, RawStream, StravaStreamType};

/// Strava stream keys and their canonical types.
pub const STREAM_TYPE_MAPPING: &[(&str, StreamType)] = &[
    (StravaStreamType::Time.as_str(), StreamType::Time),
    (StravaStreamType::Distance.as_str(), StreamType::Distance),
    (StravaStreamType::Latlng.as_str(), StreamType::Latlng),
    (StravaStreamType::Altitude.as_str(), StreamType::Altitude),
    (
        StravaStreamType::VelocitySmooth.as_str(),
        StreamType::VelocitySmooth,
    ),
    (StravaStreamType::Heartrate.as_str(), StreamType::Heartrate),
    (StravaStreamType::Cadence.as_str(), StreamType::Cadence),
    (StravaStreamType::Watts.as_str(), StreamType::Watts),
    (StravaStreamType::Temp.as_str(), StreamType::Temp),
    (StravaStreamType::Moving.as_str(), StreamType::Moving),
    (
        StravaStreamType::GradeSmooth.as_str(),
        StreamType::GradeSmooth,
    ),
];

/// Converts Strava payloads into the canonical model.
///
/// `STREAM_TYPE_MAPPING` covers every Strava key and every canonical name, so
/// `Passthrough` and `Reject` currently give the same result: any tag outside
/// the table fails with `UnmappedStreamType`. The policy only matters once
/// Strava adds a key that matches a canonical name the table lacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StravaConverter {
    unmapped: UnmappedStreamPolicy,
}

impl StravaConverter {
    pub fn new(unmapped: UnmappedStreamPolicy) -> Self {
        Self { unmapped }
    }

    fn wrong_payload(found: Provider) -> ConvertError {
        ConvertError::invalid(
            Provider::Strava,
            "payload",
            format!("expected a strava payload, got {}", found),
        )
    }
}

impl Converter for StravaConverter {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    fn to_activity(&self, raw: &RawActivity) -> Result<Activity, ConvertError> {
        let RawActivity::Strava(activity) = raw else {
            return Err(Self::wrong_payload(raw.provider()));
        };

        Ok(Activity::new(
            Provider::Strava,
            activity.id,
            activity.distance,
            activity.moving_time,
            activity.elapsed_time,
        ))
    }

    fn to_stream(&self, raw: &RawStream) -> Result<Stream, ConvertError> {
        let RawStream::Strava(stream) = raw else {
            return Err(Self::wrong_payload(raw.provider()));
        };

        let stream_type = map_stream_type(
            Provider::Strava,
            STREAM_TYPE_MAPPING,
            &stream.stream_type,
            self.unmapped,
        )?;

        Stream::from_samples(stream_type, stream.data.iter().copied()).map_err(|e| {
            ConvertError::invalid(
                Provider::Strava,
                format!("streams[{}].data", stream.stream_type),
                e.to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::ConvertErrorKind;
    use crate::providers::{CorosWorkout, StravaActivity, StravaStream};

    fn raw_activity() -> RawActivity {
        RawActivity::Strava(StravaActivity {
            id: 123,
            name: Some("Lunch Run".to_string()),
            sport_type: Some("Run".to_string()),
            start_date: None,
            timezone: None,
            distance: 5000.0,
            moving_time: 1500,
            elapsed_time: 1600,
            total_elevation_gain: None,
            average_speed: None,
            max_speed: None,
            average_heartrate: None,
            max_heartrate: None,
            average_cadence: None,
            average_watts: None,
            has_heartrate: true,
            description: None,
            device_name: None,
        })
    }

    fn raw_stream(tag: &str, data: Vec<Option<f64>>) -> RawStream {
        RawStream::Strava(StravaStream {
            stream_type: tag.to_string(),
            data,
            series_type: None,
            original_size: None,
            resolution: None,
        })
    }

    #[test]
    fn test_mapping_covers_every_strava_key() {
        for key in StravaStreamType::ALL {
            assert!(
                STREAM_TYPE_MAPPING.iter().any(|(k, _)| *k == key.as_str()),
                "missing mapping for {}",
                key.as_str()
            );
        }
    }

    #[test]
    fn test_to_activity_maps_scalar_fields() {
        let activity = StravaConverter::default()
            .to_activity(&raw_activity())
            .unwrap();

        assert_eq!(activity.provider, Provider::Strava);
        assert_eq!(activity.provider_activity_id, 123);
        assert_eq!(activity.distance, 5000.0);
        assert_eq!(activity.moving_time, 1500);
        assert_eq!(activity.duration, 1600);
        assert!(activity.streams.is_empty());
        assert_eq!(activity.id, None);
    }

    #[test]
    fn test_to_activity_is_repeatable() {
        let converter = StravaConverter::default();
        let raw = raw_activity();
        let first = converter.to_activity(&raw).unwrap();
        let second = converter.to_activity(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_to_activity_rejects_other_provider_payload() {
        let raw = RawActivity::Coros(CorosWorkout {
            id: "x".to_string(),
            name: None,
            start_time: "2024-01-01T00:00:00Z".to_string(),
            duration: None,
            sport_type: 1,
            distance: None,
        });
        let err = StravaConverter::default().to_activity(&raw).unwrap_err();
        assert_eq!(err.kind(), ConvertErrorKind::InvalidPayload);
    }

    #[test]
    fn test_to_stream_keeps_order_and_gaps() {
        let stream = StravaConverter::default()
            .to_stream(&raw_stream(
                "velocity_smooth",
                vec![Some(3.0), None, Some(1.0), Some(1.0)],
            ))
            .unwrap();

        assert_eq!(stream.stream_type, StreamType::VelocitySmooth);
        let pairs: Vec<(u32, Option<f64>)> =
            stream.entries.iter().map(|e| (e.index, e.value)).collect();
        assert_eq!(
            pairs,
            vec![(0, Some(3.0)), (1, None), (2, Some(1.0)), (3, Some(1.0))]
        );
    }

    #[test]
    fn test_to_streams_preserves_caller_order() {
        let streams = StravaConverter::default()
            .to_streams(&[
                raw_stream("watts", vec![Some(200.0)]),
                raw_stream("time", vec![Some(0.0)]),
                raw_stream("heartrate", vec![Some(90.0)]),
            ])
            .unwrap();

        let types: Vec<StreamType> = streams.iter().map(|s| s.stream_type).collect();
        assert_eq!(
            types,
            vec![StreamType::Watts, StreamType::Time, StreamType::Heartrate]
        );
    }

    #[test]
    fn test_policies_agree_for_strava_tags() {
        let passthrough = StravaConverter::new(UnmappedStreamPolicy::Passthrough);
        let reject = StravaConverter::new(UnmappedStreamPolicy::Reject);

        for key in StravaStreamType::ALL {
            let raw = raw_stream(key.as_str(), vec![Some(1.0)]);
            assert_eq!(passthrough.to_stream(&raw), reject.to_stream(&raw));
        }

        let unknown = raw_stream("smo2", vec![Some(1.0)]);
        assert_eq!(
            passthrough.to_stream(&unknown).unwrap_err().kind(),
            ConvertErrorKind::UnmappedStreamType
        );
        assert_eq!(passthrough.to_stream(&unknown), reject.to_stream(&unknown));
    }
}
