// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider-agnostic conversion pipeline.
//!
//! A `Converter` turns one provider's payload models into canonical
//! entities. Converters are stateless; the `ConverterRegistry` hands out a
//! shared instance per provider and `ConversionService` composes the result.

pub mod coros;
pub mod registry;
pub mod service;
pub mod strava;

use crate::models::{Activity, Provider, Stream, StreamType};
use crate::providers::{RawActivity, RawStream};

pub use coros::CorosConverter;
pub use registry::{get_converter, ConverterRegistry};
pub use service::ConversionService;
pub use strava::StravaConverter;

/// Conversion contract implemented once per provider.
pub trait Converter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Map provider fields onto a canonical activity with no streams.
    fn to_activity(&self, raw: &RawActivity) -> Result<Activity, ConvertError>;

    /// Map one provider stream onto a canonical stream.
    fn to_stream(&self, raw: &RawStream) -> Result<Stream, ConvertError>;

    /// Convert streams element-wise, keeping the caller's order.
    fn to_streams(&self, raw: &[RawStream]) -> Result<Vec<Stream>, ConvertError> {
        raw.iter().map(|s| self.to_stream(s)).collect()
    }
}

/// What to do with a provider stream tag missing from the mapping table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedStreamPolicy {
    /// Reuse the provider tag as a canonical name if it is one (logged).
    #[default]
    Passthrough,
    /// Fail with `UnmappedStreamType`.
    Reject,
}

/// Resolve a provider stream tag through `table`, applying `policy` on a miss.
pub fn map_stream_type<K>(
    provider: Provider,
    table: &[(K, StreamType)],
    tag: &str,
    policy: UnmappedStreamPolicy,
) -> Result<StreamType, ConvertError>
where
    K: AsRef<str>,
{
    if let Some((_, canonical)) = table.iter().find(|(k, _)| k.as_ref() == tag) {
        return Ok(*canonical);
    }

    let unmapped = || ConvertError::UnmappedStreamType {
        provider,
        activity_id: None,
        stream_type: tag.to_string(),
    };

    match policy {
        UnmappedStreamPolicy::Reject => Err(unmapped()),
        UnmappedStreamPolicy::Passthrough => {
            let canonical = tag.parse::<StreamType>().map_err(|_| unmapped())?;
            tracing::warn!(
                provider = %provider,
                stream_type = tag,
                "Stream type not in mapping table, reusing provider name"
            );
            Ok(canonical)
        }
    }
}

/// Conversion failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertErrorKind {
    InvalidPayload,
    UnsupportedProvider,
    NotImplemented,
    UnmappedStreamType,
}

/// Errors from the conversion pipeline. None of these are retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("Invalid {provider} payload{}: field `{field}`: {reason}", activity_context(.activity_id))]
    InvalidPayload {
        provider: Provider,
        activity_id: Option<u64>,
        field: String,
        reason: String,
    },

    #[error("Unsupported provider: {tag}")]
    UnsupportedProvider { tag: String },

    #[error("{provider} converter not yet implemented ({operation})")]
    NotImplemented {
        provider: Provider,
        operation: &'static str,
    },

    #[error("Unmapped {provider} stream type `{stream_type}`{}", activity_context(.activity_id))]
    UnmappedStreamType {
        provider: Provider,
        activity_id: Option<u64>,
        stream_type: String,
    },
}

fn activity_context(activity_id: &Option<u64>) -> String {
    match activity_id {
        Some(id) => format!(" for activity {}", id),
        None => String::new(),
    }
}

impl ConvertError {
    pub fn invalid(
        provider: Provider,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConvertError::InvalidPayload {
            provider,
            activity_id: None,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ConvertErrorKind {
        match self {
            ConvertError::InvalidPayload { .. } => ConvertErrorKind::InvalidPayload,
            ConvertError::UnsupportedProvider { .. } => ConvertErrorKind::UnsupportedProvider,
            ConvertError::NotImplemented { .. } => ConvertErrorKind::NotImplemented,
            ConvertError::UnmappedStreamType { .. } => ConvertErrorKind::UnmappedStreamType,
        }
    }

    /// Fill in the activity ID if the error does not carry one yet.
    pub fn with_activity_id(self, id: u64) -> Self {
        self.with_activity_id_opt(Some(id))
    }

    pub fn with_activity_id_opt(mut self, id: Option<u64>) -> Self {
        match &mut self {
            ConvertError::InvalidPayload { activity_id, .. }
            | ConvertError::UnmappedStreamType { activity_id, .. } => {
                if activity_id.is_none() {
                    *activity_id = id;
                }
            }
            ConvertError::UnsupportedProvider { .. } | ConvertError::NotImplemented { .. } => {}
        }
        self
    }
}
