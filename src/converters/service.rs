// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversion service: the single entry point into the pipeline.
//!
//! 1. Resolve the converter for the provider tag
//! 2. Convert the activity
//! 3. Convert all streams
//! 4. Attach the streams to the activity
//!
//! No I/O happens here; the caller hands the result to the store.

use super::{ConvertError, ConverterRegistry};
use crate::models::{Activity, Provider};
use crate::providers::{RawActivity, RawStream};

/// Composes canonical activities from provider payloads.
#[derive(Clone, Copy)]
pub struct ConversionService<'r> {
    registry: &'r ConverterRegistry,
}

impl ConversionService<'static> {
    /// Service backed by the global registry.
    pub fn global() -> Self {
        Self::new(ConverterRegistry::global())
    }
}

impl Default for ConversionService<'static> {
    fn default() -> Self {
        Self::global()
    }
}

impl<'r> ConversionService<'r> {
    pub fn new(registry: &'r ConverterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r ConverterRegistry {
        self.registry
    }

    /// Convert one provider activity and its streams into a canonical activity.
    ///
    /// The returned stream set replaces whatever was stored before; it is a
    /// complete tree, never a delta.
    pub fn process(
        &self,
        provider: &str,
        raw_activity: &RawActivity,
        raw_streams: &[RawStream],
    ) -> Result<Activity, ConvertError> {
        let converter = self.registry.get(provider)?;

        let mut activity = converter.to_activity(raw_activity)?;
        let activity_id = activity.provider_activity_id;

        let streams = converter
            .to_streams(raw_streams)
            .map_err(|e| e.with_activity_id(activity_id))?;
        let replaced = activity.attach_streams(streams);

        tracing::debug!(
            provider = %activity.provider,
            activity_id,
            streams = activity.streams.len(),
            replaced,
            "Converted activity"
        );

        Ok(activity)
    }

    pub fn process_strava(
        &self,
        raw_activity: &RawActivity,
        raw_streams: &[RawStream],
    ) -> Result<Activity, ConvertError> {
        self.process(Provider::Strava.as_str(), raw_activity, raw_streams)
    }

    pub fn process_coros(
        &self,
        raw_activity: &RawActivity,
        raw_streams: &[RawStream],
    ) -> Result<Activity, ConvertError> {
        self.process(Provider::Coros.as_str(), raw_activity, raw_streams)
    }
}
