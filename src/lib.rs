// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stride: normalize fitness activities from multiple providers
//!
//! This crate converts provider payloads (Strava today, COROS planned) into a
//! canonical activity/stream model and stores them in SQLite. The conversion
//! core (`converters`, `models`) does no I/O; `services` and `db` fetch and
//! persist around it.

pub mod config;
pub mod converters;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod time_utils;

pub use converters::{ConversionService, ConvertError, Converter, ConverterRegistry};
pub use models::{Activity, Provider, Stream, StreamEntry, StreamType};
