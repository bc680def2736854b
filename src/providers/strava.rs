// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API payload models.
//!
//! These mirror the JSON Strava returns and are validated as they are parsed,
//! so converters can rely on their shape.

use crate::converters::ConvertError;
use crate::models::Provider;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Detailed or summary Strava activity.
///
/// Only the fields the pipeline reads are required; everything else is kept
/// for logging and future use. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StravaActivity {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Sport type (Ride, Run, Hike, etc.)
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Start date/time (ISO 8601)
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Distance in meters
    #[validate(range(min = 0.0))]
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: u32,
    /// Elapsed time in seconds
    pub elapsed_time: u32,
    /// Elevation gain in meters
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    /// Meters per second
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    #[serde(default)]
    pub has_heartrate: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Device name (e.g. "Garmin Edge 530")
    #[serde(default)]
    pub device_name: Option<String>,
}

/// One stream as returned by `/activities/{id}/streams` without `key_by_type`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StravaStream {
    /// Strava stream key, e.g. "heartrate"
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub stream_type: String,
    /// Samples in recording order; `null` marks a missing reading
    #[serde(deserialize_with = "deserialize_samples")]
    pub data: Vec<Option<f64>>,
    #[serde(default)]
    pub series_type: Option<String>,
    #[serde(default)]
    pub original_size: Option<u64>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Stream keys Strava understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StravaStreamType {
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

impl StravaStreamType {
    pub const ALL: [StravaStreamType; 11] = [
        StravaStreamType::Time,
        StravaStreamType::Distance,
        StravaStreamType::Latlng,
        StravaStreamType::Altitude,
        StravaStreamType::VelocitySmooth,
        StravaStreamType::Heartrate,
        StravaStreamType::Cadence,
        StravaStreamType::Watts,
        StravaStreamType::Temp,
        StravaStreamType::Moving,
        StravaStreamType::GradeSmooth,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            StravaStreamType::Time => "time",
            StravaStreamType::Distance => "distance",
            StravaStreamType::Latlng => "latlng",
            StravaStreamType::Altitude => "altitude",
            StravaStreamType::VelocitySmooth => "velocity_smooth",
            StravaStreamType::Heartrate => "heartrate",
            StravaStreamType::Cadence => "cadence",
            StravaStreamType::Watts => "watts",
            StravaStreamType::Temp => "temp",
            StravaStreamType::Moving => "moving",
            StravaStreamType::GradeSmooth => "grade_smooth",
        }
    }

    /// Parse a Strava stream key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == key)
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    #[serde(default)]
    pub token_type: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// A scalar sample as Strava encodes it.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSample {
    Number(f64),
    Bool(bool),
}

fn deserialize_samples<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<RawSample>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|sample| {
            sample.map(|s| match s {
                RawSample::Number(n) => n,
                RawSample::Bool(true) => 1.0,
                RawSample::Bool(false) => 0.0,
            })
        })
        .collect())
}

/// Parse and validate one activity.
pub fn parse_activity(json: &str) -> Result<StravaActivity, ConvertError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ConvertError::invalid(Provider::Strava, "payload", e.to_string()))?;
    activity_from_value(value)
}

/// Validate an already-decoded activity object.
pub fn activity_from_value(value: serde_json::Value) -> Result<StravaActivity, ConvertError> {
    let activity_id = value.get("id").and_then(|v| v.as_u64());

    let activity: StravaActivity = serde_path_to_error::deserialize(value).map_err(|e| {
        ConvertError::invalid(Provider::Strava, error_field(&e), e.inner().to_string())
            .with_activity_id_opt(activity_id)
    })?;

    activity.validate().map_err(|e| {
        ConvertError::invalid(Provider::Strava, first_invalid_field(&e), e.to_string())
            .with_activity_id(activity.id)
    })?;

    Ok(activity)
}

/// Parse and validate a stream list.
///
/// A single stream object is accepted where a list is expected.
pub fn parse_streams(json: &str) -> Result<Vec<StravaStream>, ConvertError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ConvertError::invalid(Provider::Strava, "streams", e.to_string()))?;
    streams_from_value(value)
}

/// Validate an already-decoded stream list (or single stream object).
pub fn streams_from_value(value: serde_json::Value) -> Result<Vec<StravaStream>, ConvertError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("streams") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(ConvertError::invalid(
                    Provider::Strava,
                    "streams",
                    "expected a list of streams",
                ))
            }
            None => vec![serde_json::Value::Object(obj)],
        },
        _ => {
            return Err(ConvertError::invalid(
                Provider::Strava,
                "streams",
                "expected a stream object or a list of streams",
            ))
        }
    };

    items.into_iter().map(stream_from_value).collect()
}

fn stream_from_value(value: serde_json::Value) -> Result<StravaStream, ConvertError> {
    let tag = value
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>")
        .to_string();

    let stream: StravaStream = serde_path_to_error::deserialize(value).map_err(|e| {
        ConvertError::invalid(
            Provider::Strava,
            format!("streams[{}].{}", tag, error_field(&e)),
            e.inner().to_string(),
        )
    })?;

    stream.validate().map_err(|e| {
        ConvertError::invalid(
            Provider::Strava,
            format!("streams[{}].{}", tag, first_invalid_field(&e)),
            e.to_string(),
        )
    })?;

    Ok(stream)
}

/// Path of the value that failed to deserialize, e.g. `moving_time` or `data[3]`.
///
/// Missing fields fail at the enclosing object, so their name comes from the
/// message instead.
fn error_field(err: &serde_path_to_error::Error<serde_json::Error>) -> String {
    let path = err.path().to_string();
    if path.is_empty() || path == "." {
        field_from_serde_error(&err.inner().to_string())
    } else {
        path
    }
}

/// Pull the field name out of a serde "missing field `x`" style message.
fn field_from_serde_error(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("missing field `") {
        if let Some(end) = rest.find('`') {
            return rest[..end].to_string();
        }
    }
    "payload".to_string()
}

fn first_invalid_field(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|k| k.to_string())
        .collect();
    fields.sort();
    fields.into_iter().next().unwrap_or_else(|| "payload".to_string())
}
