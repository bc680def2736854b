// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - I/O collaborators around the conversion core.

pub mod activity;
pub mod strava;

pub use activity::{ActivityProcessor, BackfillReport, ProcessResult};
pub use strava::{StravaClient, StravaService, TokenStatus, DEFAULT_STREAM_TYPES};
