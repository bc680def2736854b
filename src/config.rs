// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is loaded first if present. Refreshed Strava tokens are
//! written back to the same file so the next run picks them up.

use chrono::{DateTime, Duration, Utc};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:stride.db";
pub const DEFAULT_STRAVA_API_BASE_URL: &str = "https://www.strava.com/api/v3";

/// Environment keys for the Strava token triple.
pub mod keys {
    pub const STRAVA_CLIENT_ID: &str = "STRAVA_CLIENT_ID";
    pub const STRAVA_CLIENT_SECRET: &str = "STRAVA_CLIENT_SECRET";
    pub const STRAVA_ACCESS_TOKEN: &str = "STRAVA_ACCESS_TOKEN";
    pub const STRAVA_REFRESH_TOKEN: &str = "STRAVA_REFRESH_TOKEN";
    pub const STRAVA_ACCESS_TOKEN_EXPIRES_AT: &str = "STRAVA_ACCESS_TOKEN_EXPIRES_AT";
    pub const STRAVA_API_BASE_URL: &str = "STRAVA_API_BASE_URL";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const ENV_FILE: &str = "ENV_FILE";
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID
    pub strava_client_id: Option<String>,
    /// Strava OAuth client secret
    pub strava_client_secret: Option<String>,
    pub strava_access_token: Option<String>,
    pub strava_refresh_token: Option<String>,
    /// When the access token expires
    pub strava_token_expires_at: Option<DateTime<Utc>>,
    pub strava_api_base_url: String,
    /// sqlx connection URL for the activity store
    pub database_url: String,
    /// File refreshed tokens are written back to
    pub env_file: PathBuf,
}

impl Config {
    /// Config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: Some("test_client_id".to_string()),
            strava_client_secret: Some("test_secret".to_string()),
            strava_access_token: Some("test_access".to_string()),
            strava_refresh_token: Some("test_refresh".to_string()),
            strava_token_expires_at: None,
            strava_api_base_url: DEFAULT_STRAVA_API_BASE_URL.to_string(),
            database_url: "sqlite::memory:".to_string(),
            env_file: PathBuf::from(".env.test"),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Strava credentials are optional here; commands that talk to Strava
    /// check for them with `require_strava_credentials()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_file = env::var(keys::ENV_FILE).unwrap_or_else(|_| ".env".to_string());
        dotenvy::from_path_override(&env_file).ok(); // Load .env file if present

        let strava_token_expires_at = match non_empty(keys::STRAVA_ACCESS_TOKEN_EXPIRES_AT) {
            Some(raw) => Some(parse_expires_at(&raw).ok_or_else(|| ConfigError::Invalid {
                key: keys::STRAVA_ACCESS_TOKEN_EXPIRES_AT,
                reason: format!("expected RFC 3339 or unix seconds, got {:?}", raw),
            })?),
            None => None,
        };

        Ok(Self {
            strava_client_id: non_empty(keys::STRAVA_CLIENT_ID),
            strava_client_secret: non_empty(keys::STRAVA_CLIENT_SECRET),
            strava_access_token: non_empty(keys::STRAVA_ACCESS_TOKEN),
            strava_refresh_token: non_empty(keys::STRAVA_REFRESH_TOKEN),
            strava_token_expires_at,
            strava_api_base_url: non_empty(keys::STRAVA_API_BASE_URL)
                .unwrap_or_else(|| DEFAULT_STRAVA_API_BASE_URL.to_string()),
            database_url: non_empty(keys::DATABASE_URL)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            env_file: PathBuf::from(env_file),
        })
    }

    /// Client ID and secret, or the first missing key.
    pub fn require_strava_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let id = self
            .strava_client_id
            .as_deref()
            .ok_or(ConfigError::Missing(keys::STRAVA_CLIENT_ID))?;
        let secret = self
            .strava_client_secret
            .as_deref()
            .ok_or(ConfigError::Missing(keys::STRAVA_CLIENT_SECRET))?;
        Ok((id, secret))
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Whether an access token expiring at `expires_at` is still usable at `now`.
///
/// Tokens inside the refresh margin, or with no known expiry, count as expired.
pub fn token_fresh_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
    expires_at.is_some_and(|expires_at| now + margin < expires_at)
}

/// Parse an expiry given as RFC 3339 or unix seconds.
pub fn parse_expires_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Space-separated form: "2025-01-01 10:00:00+00:00"
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Set `KEY=value` pairs in an env file, replacing existing lines in place
/// and appending new keys. The file is created if missing.
pub fn update_env_file(path: &Path, pairs: &[(&str, &str)]) -> Result<(), ConfigError> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfigError::EnvFile(format!("{}: {}", path.display(), e))),
    };

    let mut pending: Vec<(&str, &str)> = pairs.to_vec();
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let key = line
                .split_once('=')
                .map(|(k, _)| k.trim().trim_start_matches("export ").trim());
            match key.and_then(|k| pending.iter().position(|(p, _)| *p == k)) {
                Some(pos) => {
                    let (k, v) = pending.remove(pos);
                    format!("{}={}", k, quote_env_value(v))
                }
                None => line.to_string(),
            }
        })
        .collect();

    lines.extend(
        pending
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, quote_env_value(v))),
    );

    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).map_err(|e| ConfigError::EnvFile(format!("{}: {}", path.display(), e)))
}

fn quote_env_value(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"') {
        format!("'{}'", value)
    } else {
        value.to_string()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to update env file {0}")]
    EnvFile(String),
}
