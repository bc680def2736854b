// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride command-line tool
//!
//! Fetches activities from Strava (or reads exported JSON), converts them
//! into the canonical model and stores them in SQLite.
//!
//! Usage:
//! ```bash
//! stride refresh-token
//! stride fetch 123456789 --streams heartrate,distance,time
//! stride backfill --days 90
//! stride import --provider strava --activity activity.json --streams streams.json
//! stride show strava 123456789
//! stride list --limit 20
//! stride delete strava 123456789
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stride::{
    config::Config,
    db::SqliteDb,
    models::Provider,
    providers::strava::StravaStreamType,
    services::{ActivityProcessor, StravaService, DEFAULT_STREAM_TYPES},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "stride",
    about = "Normalize fitness activities into a local SQLite store",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Database URL override (defaults to DATABASE_URL or sqlite:stride.db)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the Strava access token if it is expired
    RefreshToken,

    /// Fetch, convert and store one Strava activity
    Fetch {
        /// Strava activity ID
        activity_id: u64,

        /// Stream keys to request (comma-separated)
        #[arg(long, value_delimiter = ',', value_parser = parse_stream_key)]
        streams: Vec<StravaStreamType>,
    },

    /// Ingest all Strava activities from the last N days
    Backfill {
        #[arg(long, default_value = "30")]
        days: u32,

        /// Stream keys to request (comma-separated)
        #[arg(long, value_delimiter = ',', value_parser = parse_stream_key)]
        streams: Vec<StravaStreamType>,
    },

    /// Import an activity from local JSON files
    Import {
        /// Provider tag (e.g. "strava")
        #[arg(long)]
        provider: String,

        /// Activity payload file
        #[arg(long)]
        activity: PathBuf,

        /// Streams payload file
        #[arg(long)]
        streams: Option<PathBuf>,
    },

    /// Print a stored activity with its streams as JSON
    Show { provider: Provider, activity_id: u64 },

    /// Print stored activity summaries as JSON
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Delete a stored activity and its streams
    Delete { provider: Provider, activity_id: u64 },
}

fn parse_stream_key(key: &str) -> std::result::Result<StravaStreamType, String> {
    StravaStreamType::from_key(key.trim()).ok_or_else(|| {
        let known: Vec<&str> = StravaStreamType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown stream key `{}` (expected one of {})", key, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs)?;

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    match args.command {
        Command::RefreshToken => {
            let strava = StravaService::from_config(&config)?;
            let status = strava.ensure_fresh_token().await?;
            println!(
                "{}",
                serde_json::json!({
                    "refreshed": status.refreshed,
                    "expires_at": status.expires_at.map(stride::time_utils::format_utc_rfc3339),
                })
            );
        }

        Command::Fetch {
            activity_id,
            streams,
        } => {
            let processor = online_processor(&config).await?;
            let result = processor
                .process_activity(activity_id, stream_types_or_default(&streams))
                .await?;
            println!(
                "Stored activity {} ({} streams{})",
                result.provider_activity_id,
                result.stream_types.len(),
                if result.replaced { ", replaced" } else { "" }
            );
        }

        Command::Backfill { days, streams } => {
            let processor = online_processor(&config).await?;
            let end = Utc::now();
            let start = end - Duration::days(i64::from(days));
            let report = processor
                .backfill(start, end, stream_types_or_default(&streams))
                .await?;

            println!(
                "Processed {} activities, {} failed",
                report.processed.len(),
                report.failed.len()
            );
            for (activity_id, error) in &report.failed {
                println!("  {}: {}", activity_id, error);
            }
        }

        Command::Import {
            provider,
            activity,
            streams,
        } => {
            let activity_json = std::fs::read_to_string(&activity)
                .with_context(|| format!("Failed to read {}", activity.display()))?;
            let streams_json = streams
                .as_ref()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .transpose()?;

            let processor = ActivityProcessor::offline(SqliteDb::open(&config.database_url).await?);
            let result = processor
                .import_files(&provider, &activity_json, streams_json.as_deref())
                .await?;
            println!(
                "Imported activity {} ({} streams{})",
                result.provider_activity_id,
                result.stream_types.len(),
                if result.replaced { ", replaced" } else { "" }
            );
        }

        Command::Show {
            provider,
            activity_id,
        } => {
            let db = SqliteDb::open(&config.database_url).await?;
            let activity = db
                .get_activity(provider, activity_id)
                .await?
                .ok_or_else(|| anyhow!("No stored {} activity {}", provider, activity_id))?;

            let streams: Vec<_> = activity
                .streams
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "stream_type": s.stream_type,
                        "values": s.values().collect::<Vec<_>>(),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "activity": activity.summary(),
                "streams": streams,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::List { limit } => {
            let db = SqliteDb::open(&config.database_url).await?;
            let summaries = db.list_activities(limit).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }

        Command::Delete {
            provider,
            activity_id,
        } => {
            let db = SqliteDb::open(&config.database_url).await?;
            if db.delete_activity(provider, activity_id).await? {
                println!("Deleted {} activity {}", provider, activity_id);
            } else {
                println!("No stored {} activity {}", provider, activity_id);
            }
        }
    }

    Ok(())
}

async fn online_processor(config: &Config) -> Result<ActivityProcessor> {
    let strava = StravaService::from_config(config)?;
    let db = SqliteDb::open(&config.database_url).await?;
    Ok(ActivityProcessor::new(strava, db))
}

fn stream_types_or_default(requested: &[StravaStreamType]) -> &[StravaStreamType] {
    if requested.is_empty() {
        DEFAULT_STREAM_TYPES
    } else {
        requested
    }
}

/// Initialize logging to stderr: JSON (flattened events) or compact text.
fn init_logging(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("stride=debug".parse()?)
        .add_directive("info".parse()?);

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(std::io::stderr);
        registry.with(format).try_init()?;
    } else {
        let format = tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr);
        registry.with(format).try_init()?;
    }

    Ok(())
}
