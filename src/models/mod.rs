// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical data model produced by the conversion pipeline.

pub mod activity;
pub mod provider;
pub mod stream;

pub use activity::{Activity, ActivitySummary, StreamFlags};
pub use provider::{Provider, UnknownProvider};
pub use stream::{Stream, StreamEntry, StreamTooLong, StreamType, UnknownStreamType};
