// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity processing service.
//!
//! Handles the core workflow:
//! 1. Fetch activity and streams from Strava (or read them from files)
//! 2. Convert them into a canonical activity
//! 3. Store the activity, replacing any earlier version

use crate::converters::ConversionService;
use crate::db::SqliteDb;
use crate::error::{AppError, Result};
use crate::models::{Activity, Provider, StreamType};
use crate::providers::strava::StravaStreamType;
use crate::providers::{parse_payloads, RawActivity, RawStream};
use crate::services::StravaService;
use crate::time_utils;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

/// Activities processed at once during backfill.
const MAX_CONCURRENT_ACTIVITIES: usize = 4;
/// Strava's maximum page size for activity listing.
const BACKFILL_PAGE_SIZE: u32 = 150;

/// Fetch, convert and store activities.
pub struct ActivityProcessor {
    strava: Option<StravaService>,
    db: SqliteDb,
    conversion: ConversionService<'static>,
}

impl ActivityProcessor {
    pub fn new(strava: StravaService, db: SqliteDb) -> Self {
        Self {
            strava: Some(strava),
            db,
            conversion: ConversionService::global(),
        }
    }

    /// Processor for local imports only; fetching fails with a config error.
    pub fn offline(db: SqliteDb) -> Self {
        Self {
            strava: None,
            db,
            conversion: ConversionService::global(),
        }
    }

    pub fn db(&self) -> &SqliteDb {
        &self.db
    }

    fn strava(&self) -> Result<&StravaService> {
        self.strava.as_ref().ok_or_else(|| {
            AppError::Config(crate::config::ConfigError::Missing(
                crate::config::keys::STRAVA_CLIENT_ID,
            ))
        })
    }

    /// Process a Strava activity by ID.
    ///
    /// Args:
    /// - activity_id: Strava activity ID
    /// - stream_types: streams to request (in order)
    pub async fn process_activity(
        &self,
        activity_id: u64,
        stream_types: &[StravaStreamType],
    ) -> Result<ProcessResult> {
        tracing::info!(activity_id, "Processing activity");
        let strava = self.strava()?;

        // 1. Fetch activity and streams (token management is handled by StravaService)
        let strava_activity = strava.get_activity(activity_id).await?;
        let strava_streams = strava.get_streams(activity_id, stream_types).await?;

        // 2-3. Convert and store
        let raw_streams: Vec<RawStream> = strava_streams.into_iter().map(RawStream::from).collect();
        self.ingest(Provider::Strava, &RawActivity::from(strava_activity), &raw_streams)
            .await
    }

    /// Convert and store payloads read from local JSON files.
    pub async fn import_files(
        &self,
        provider: &str,
        activity_json: &str,
        streams_json: Option<&str>,
    ) -> Result<ProcessResult> {
        // Unknown tags fail here before any parsing
        let converter = self.conversion.registry().get(provider)?;
        let (raw_activity, raw_streams) =
            parse_payloads(converter.provider(), activity_json, streams_json)?;

        tracing::info!(provider, streams = raw_streams.len(), "Importing activity");
        self.ingest(converter.provider(), &raw_activity, &raw_streams).await
    }

    async fn ingest(
        &self,
        provider: Provider,
        raw_activity: &RawActivity,
        raw_streams: &[RawStream],
    ) -> Result<ProcessResult> {
        let activity = self
            .conversion
            .process(provider.as_str(), raw_activity, raw_streams)?;

        let (saved, revision) = self.db.upsert_activity(&activity).await?;
        let result = ProcessResult::from_saved(&saved, revision > 1);

        tracing::info!(
            %provider,
            activity_id = result.provider_activity_id,
            streams = ?result.stream_types,
            replaced = result.replaced,
            "Activity stored"
        );

        Ok(result)
    }

    /// Ingest every activity that started within `[start, end)`.
    ///
    /// The range is listed in 30-day windows, page by page. Failures of single
    /// activities are collected; listing failures abort the run.
    pub async fn backfill(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        stream_types: &[StravaStreamType],
    ) -> Result<BackfillReport> {
        let strava = self.strava()?;
        let windows = time_utils::split_date_range(start, end, time_utils::DAYS_IN_MONTH);

        tracing::info!(
            start = %time_utils::format_utc_rfc3339(start),
            end = %time_utils::format_utc_rfc3339(end),
            windows = windows.len(),
            "Starting backfill"
        );

        let mut activity_ids = Vec::new();
        for (window_start, window_end) in windows {
            let mut page = 1;
            loop {
                let activities = strava
                    .list_activities(
                        Some(window_start.timestamp()),
                        Some(window_end.timestamp()),
                        page,
                        BACKFILL_PAGE_SIZE,
                    )
                    .await?;

                let count = activities.len();
                activity_ids.extend(activities.into_iter().map(|a| a.id));
                tracing::debug!(page, count, "Listed activities");

                if count < BACKFILL_PAGE_SIZE as usize {
                    break;
                }
                page += 1;
            }
        }

        // Windows are half-open, but dedupe in case Strava's bounds are inclusive
        activity_ids.sort_unstable();
        activity_ids.dedup();

        let outcomes: Vec<(u64, Result<ProcessResult>)> = stream::iter(activity_ids)
            .map(|id| async move { (id, self.process_activity(id, stream_types).await) })
            .buffer_unordered(MAX_CONCURRENT_ACTIVITIES)
            .collect()
            .await;

        let mut report = BackfillReport::default();
        for (activity_id, outcome) in outcomes {
            match outcome {
                Ok(result) => report.processed.push(result),
                Err(e) => {
                    tracing::warn!(activity_id, error = %e, "Failed to process activity");
                    report.failed.push((activity_id, e.to_string()));
                }
            }
        }

        tracing::info!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Backfill complete"
        );

        Ok(report)
    }
}

/// Result of processing an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// Store-assigned activity ID
    pub activity_id: i64,
    pub provider_activity_id: u64,
    pub stream_types: Vec<StreamType>,
    /// Whether an earlier version of the activity was replaced
    pub replaced: bool,
}

impl ProcessResult {
    fn from_saved(activity: &Activity, replaced: bool) -> Self {
        Self {
            activity_id: activity.id.unwrap_or_default(),
            provider_activity_id: activity.provider_activity_id,
            stream_types: activity.streams.iter().map(|s| s.stream_type).collect(),
            replaced,
        }
    }
}

/// Outcome of a backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub processed: Vec<ProcessResult>,
    /// Provider activity ID and error message
    pub failed: Vec<(u64, String)>,
}
