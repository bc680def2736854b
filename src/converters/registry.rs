// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider tag to converter lookup.
//!
//! The global registry is built once per process and never mutated, so the
//! returned converters can be shared freely across threads and tasks.

use super::{ConvertError, Converter, CorosConverter, StravaConverter};
use crate::models::Provider;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static GLOBAL: OnceLock<ConverterRegistry> = OnceLock::new();

/// Immutable map from provider to its converter.
pub struct ConverterRegistry {
    converters: BTreeMap<Provider, Box<dyn Converter>>,
}

impl ConverterRegistry {
    /// Registry with every built-in converter.
    pub fn new() -> Self {
        Self::from_converters(vec![
            Box::new(StravaConverter::default()) as Box<dyn Converter>,
            Box::new(CorosConverter),
        ])
    }

    /// Registry holding exactly `converters`, keyed by their provider.
    pub fn from_converters(converters: Vec<Box<dyn Converter>>) -> Self {
        let converters: BTreeMap<Provider, Box<dyn Converter>> = converters
            .into_iter()
            .map(|c| (c.provider(), c))
            .collect();

        let names: Vec<&str> = converters.keys().map(|p| p.as_str()).collect();
        tracing::info!(
            count = converters.len(),
            providers = %names.join(", "),
            "Converter registry initialized"
        );

        Self { converters }
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> &'static ConverterRegistry {
        GLOBAL.get_or_init(ConverterRegistry::new)
    }

    /// Look up the converter for a provider tag such as `"strava"`.
    pub fn get(&self, tag: &str) -> Result<&dyn Converter, ConvertError> {
        let provider = tag
            .parse::<Provider>()
            .map_err(|_| ConvertError::UnsupportedProvider {
                tag: tag.to_string(),
            })?;
        self.get_provider(provider)
    }

    pub fn get_provider(&self, provider: Provider) -> Result<&dyn Converter, ConvertError> {
        self.converters
            .get(&provider)
            .map(|c| c.as_ref())
            .ok_or_else(|| ConvertError::UnsupportedProvider {
                tag: provider.as_str().to_string(),
            })
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.converters.keys().copied()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up a converter in the global registry.
pub fn get_converter(tag: &str) -> Result<&'static dyn Converter, ConvertError> {
    ConverterRegistry::global().get(tag)
}
