// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! COROS converter placeholder.
//!
//! Registered so the provider tag resolves, but every operation fails with
//! `NotImplemented` until the COROS payloads are mapped.

use super::{ConvertError, Converter};
use crate::models::{Activity, Provider, Stream};
use crate::providers::{RawActivity, RawStream};

#[derive(Debug, Clone, Copy, Default)]
pub struct CorosConverter;

impl CorosConverter {
    fn not_implemented(operation: &'static str) -> ConvertError {
        ConvertError::NotImplemented {
            provider: Provider::Coros,
            operation,
        }
    }
}

impl Converter for CorosConverter {
    fn provider(&self) -> Provider {
        Provider::Coros
    }

    fn to_activity(&self, _raw: &RawActivity) -> Result<Activity, ConvertError> {
        Err(Self::not_implemented("to_activity"))
    }

    fn to_stream(&self, _raw: &RawStream) -> Result<Stream, ConvertError> {
        Err(Self::not_implemented("to_stream"))
    }

    fn to_streams(&self, _raw: &[RawStream]) -> Result<Vec<Stream>, ConvertError> {
        Err(Self::not_implemented("to_streams"))
    }
}
