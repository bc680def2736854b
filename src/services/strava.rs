// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching activities and streams.
//!
//! Handles:
//! - Activity and stream fetching (parsed through the payload models)
//! - Paginated activity listing for backfill
//! - Token refresh when expired, persisted back to the env file
//! - Rate limit and authorization failure detection

use crate::config::{self, Config};
use crate::error::AppError;
use crate::providers::strava::{
    activity_from_value, streams_from_value, StravaActivity, StravaStream, StravaStreamType,
    TokenRefreshResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Streams fetched when the caller does not ask for specific ones.
pub const DEFAULT_STREAM_TYPES: &[StravaStreamType] = &[
    StravaStreamType::Heartrate,
    StravaStreamType::Distance,
    StravaStreamType::Time,
    StravaStreamType::VelocitySmooth,
];

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config::DEFAULT_STRAVA_API_BASE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        let value: serde_json::Value = self.get_json(&url, access_token, &[]).await?;
        Ok(activity_from_value(value)?)
    }

    /// List activities in a time window (paginated).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: Option<i64>,  // Unix timestamp
        before: Option<i64>, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }

        let values: Vec<serde_json::Value> = self.get_json(&url, access_token, &query).await?;
        values
            .into_iter()
            .map(|v| activity_from_value(v).map_err(AppError::from))
            .collect()
    }

    /// Get the requested streams of an activity, in the requested order.
    pub async fn get_streams(
        &self,
        access_token: &str,
        activity_id: u64,
        stream_types: &[StravaStreamType],
    ) -> Result<Vec<StravaStream>, AppError> {
        if stream_types.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let query = [
            ("keys", stream_keys(stream_types)),
            ("key_by_type", "true".to_string()),
        ];

        let value: serde_json::Value = self.get_json(&url, access_token, &query).await?;
        let streams = streams_from_value(normalize_streams_response(value, stream_types))
            .map_err(|e| e.with_activity_id(activity_id))?;

        tracing::debug!(activity_id, count = streams.len(), "Fetched streams");
        Ok(streams)
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        tracing::debug!(url, "Strava GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Map a non-success status to an error carrying the retry/auth markers.
fn status_error(status: u16, body: &str) -> AppError {
    match status {
        // Rate limit - the caller decides whether to retry later
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string())
        }
        // Unauthorized - token may be expired
        401 => AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()),
        404 => AppError::NotFound(format!("Strava resource: {}", body)),
        _ => AppError::StravaApi(format!("HTTP {}: {}", status, body)),
    }
}

fn stream_keys(stream_types: &[StravaStreamType]) -> String {
    stream_types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Turn a `key_by_type` response into the list form, ordered as requested.
///
/// Strava also returns streams it was not asked for (usually `distance`);
/// those follow the requested ones in key order. List responses pass through.
fn normalize_streams_response(
    value: serde_json::Value,
    requested: &[StravaStreamType],
) -> serde_json::Value {
    let serde_json::Value::Object(mut keyed) = value else {
        return value;
    };
    if keyed.contains_key("type") || keyed.contains_key("streams") {
        return serde_json::Value::Object(keyed);
    }

    let mut ordered = Vec::with_capacity(keyed.len());
    for key in requested.iter().map(|t| t.as_str()) {
        if let Some(stream) = keyed.remove(key) {
            ordered.push(with_type(key, stream));
        }
    }
    for (key, stream) in keyed {
        ordered.push(with_type(&key, stream));
    }
    serde_json::Value::Array(ordered)
}

fn with_type(key: &str, stream: serde_json::Value) -> serde_json::Value {
    match stream {
        serde_json::Value::Object(mut obj) => {
            obj.insert(
                "type".to_string(),
                serde_json::Value::String(key.to_string()),
            );
            serde_json::Value::Object(obj)
        }
        other => other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Access token with expiry information.
#[derive(Clone, Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    fn valid_at(&self, now: DateTime<Utc>) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|_| config::token_fresh_at(self.expires_at, now))
    }
}

/// Result of a token check.
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub refreshed: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// High-level Strava service that manages the token lifecycle and API calls.
///
/// The token is shared by every clone, so concurrent tasks refresh it once.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    token: Arc<Mutex<TokenState>>,
    env_file: PathBuf,
}

impl StravaService {
    pub fn new(client: StravaClient, config: &Config) -> Self {
        Self {
            client,
            token: Arc::new(Mutex::new(TokenState {
                access_token: config.strava_access_token.clone(),
                refresh_token: config.strava_refresh_token.clone(),
                expires_at: config.strava_token_expires_at,
            })),
            env_file: config.env_file.clone(),
        }
    }

    /// Build the client from configuration; requires Strava credentials.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let (client_id, client_secret) = config.require_strava_credentials()?;
        let client = StravaClient::new(client_id.to_string(), client_secret.to_string())
            .with_base_url(&config.strava_api_base_url);
        Ok(Self::new(client, config))
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token, refreshing if needed.
    pub async fn get_valid_access_token(&self) -> Result<String, AppError> {
        let mut state = self.token.lock().await;
        if let Some(token) = state.valid_at(Utc::now()) {
            return Ok(token.to_string());
        }
        self.refresh_locked(&mut state).await?;
        state
            .access_token
            .clone()
            .ok_or_else(|| AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()))
    }

    /// Refresh the token only if it is expired or about to expire.
    pub async fn ensure_fresh_token(&self) -> Result<TokenStatus, AppError> {
        let mut state = self.token.lock().await;
        if state.valid_at(Utc::now()).is_some() {
            tracing::info!("Strava access token is valid, skipping refresh");
            return Ok(TokenStatus {
                refreshed: false,
                expires_at: state.expires_at,
            });
        }
        self.refresh_locked(&mut state).await?;
        Ok(TokenStatus {
            refreshed: true,
            expires_at: state.expires_at,
        })
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> Result<(), AppError> {
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or(config::ConfigError::Missing(config::keys::STRAVA_REFRESH_TOKEN))?;

        tracing::info!("Access token expired, refreshing");
        let new_tokens = self.client.refresh_token(&refresh_token).await?;
        let expires_at = DateTime::from_timestamp(new_tokens.expires_at, 0).ok_or_else(|| {
            AppError::StravaApi(format!("Invalid expires_at: {}", new_tokens.expires_at))
        })?;

        state.access_token = Some(new_tokens.access_token.clone());
        state.refresh_token = Some(new_tokens.refresh_token.clone());
        state.expires_at = Some(expires_at);

        let expires_str = crate::time_utils::format_utc_rfc3339(expires_at);
        if let Err(e) = persist_tokens(
            &self.env_file,
            vec![
                (config::keys::STRAVA_ACCESS_TOKEN, new_tokens.access_token),
                (config::keys::STRAVA_REFRESH_TOKEN, new_tokens.refresh_token),
                (config::keys::STRAVA_ACCESS_TOKEN_EXPIRES_AT, expires_str.clone()),
            ],
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to persist refreshed tokens, continuing anyway");
        }

        tracing::info!(expires_at = %expires_str, "Token refreshed");
        Ok(())
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    pub async fn get_activity(&self, activity_id: u64) -> Result<StravaActivity, AppError> {
        let access_token = self.get_valid_access_token().await?;
        self.client.get_activity(&access_token, activity_id).await
    }

    pub async fn list_activities(
        &self,
        after: Option<i64>,
        before: Option<i64>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let access_token = self.get_valid_access_token().await?;
        self.client
            .list_activities(&access_token, after, before, page, per_page)
            .await
    }

    pub async fn get_streams(
        &self,
        activity_id: u64,
        stream_types: &[StravaStreamType],
    ) -> Result<Vec<StravaStream>, AppError> {
        let access_token = self.get_valid_access_token().await?;
        self.client
            .get_streams(&access_token, activity_id, stream_types)
            .await
    }
}

/// Write refreshed tokens to the env file off the async runtime.
async fn persist_tokens(
    env_file: &Path,
    pairs: Vec<(&'static str, String)>,
) -> Result<(), config::ConfigError> {
    let env_file = env_file.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        config::update_env_file(&env_file, &pairs)
    })
    .await
    .map_err(|e| config::ConfigError::EnvFile(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_stream_keys_join() {
        assert_eq!(stream_keys(DEFAULT_STREAM_TYPES), "heartrate,distance,time,velocity_smooth");
    }

    #[test]
    fn test_normalize_keyed_response_follows_request_order() {
        let keyed = json!({
            "distance": {"data": [0.0, 1.0], "series_type": "distance"},
            "heartrate": {"data": [90, 91], "series_type": "distance"},
            "time": {"data": [0, 1]}
        });

        let list = normalize_streams_response(
            keyed,
            &[StravaStreamType::Heartrate, StravaStreamType::Time],
        );
        let streams = streams_from_value(list).unwrap();

        let tags: Vec<&str> = streams.iter().map(|s| s.stream_type.as_str()).collect();
        assert_eq!(tags, vec!["heartrate", "time", "distance"]);
        assert_eq!(streams[0].data, vec![Some(90.0), Some(91.0)]);
    }

    #[test]
    fn test_normalize_passes_list_through() {
        let list = json!([{"type": "time", "data": [0]}]);
        assert_eq!(
            normalize_streams_response(list.clone(), DEFAULT_STREAM_TYPES),
            list
        );
    }

    #[test]
    fn test_status_error_markers() {
        assert!(status_error(429, "").is_strava_rate_limit());
        assert!(status_error(401, "").is_strava_token_error());
        assert!(matches!(status_error(404, "gone"), AppError::NotFound(_)));
        assert!(!status_error(500, "Internal Server Error").is_strava_token_error());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = StravaClient::new("id".into(), "secret".into())
            .with_base_url("http://localhost:9000/api/v3/");
        assert_eq!(client.base_url(), "http://localhost:9000/api/v3");
    }

    #[tokio::test]
    async fn test_valid_token_used_without_refresh() {
        let mut config = Config::test_default();
        config.strava_token_expires_at = Some(Utc::now() + Duration::hours(2));
        let service = StravaService::from_config(&config).unwrap();

        let token = service.get_valid_access_token().await.unwrap();
        assert_eq!(token, "test_access");

        let status = service.ensure_fresh_token().await.unwrap();
        assert!(!status.refreshed);
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token_errors() {
        let mut config = Config::test_default();
        config.strava_token_expires_at = Some(Utc::now() - Duration::hours(1));
        config.strava_refresh_token = None;
        let service = StravaService::from_config(&config).unwrap();

        let err = service.get_valid_access_token().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(config::ConfigError::Missing(
                config::keys::STRAVA_REFRESH_TOKEN
            ))
        ));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = Config::test_default();
        config.strava_client_secret = None;
        assert!(matches!(
            StravaService::from_config(&config),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_tokens_updates_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "STRAVA_CLIENT_ID=42\nSTRAVA_ACCESS_TOKEN=old\n").unwrap();

        persist_tokens(
            &path,
            vec![
                (config::keys::STRAVA_ACCESS_TOKEN, "new-access".to_string()),
                (config::keys::STRAVA_REFRESH_TOKEN, "new-refresh".to_string()),
            ],
        )
        .await
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("STRAVA_CLIENT_ID=42"), "{contents}");
        assert!(contents.contains("STRAVA_ACCESS_TOKEN=new-access"), "{contents}");
        assert!(contents.contains("STRAVA_REFRESH_TOKEN=new-refresh"), "{contents}");
        assert!(!contents.contains("=old"), "{contents}");
    }
}
