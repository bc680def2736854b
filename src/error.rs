// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types for the collaborators around the core.

use crate::config::ConfigError;
use crate::converters::ConvertError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker for Strava 429 responses.
    pub const STRAVA_RATE_LIMIT: &'static str = "Rate limit exceeded";
    /// Marker for Strava 401 responses.
    pub const STRAVA_TOKEN_ERROR: &'static str = "Token expired or invalid";

    /// Whether this is a Strava authorization failure (expired/revoked token).
    pub fn is_strava_token_error(&self) -> bool {
        match self {
            AppError::StravaApi(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("token") || msg.contains("invalid") || msg.contains("unauthorized")
            }
            _ => false,
        }
    }

    pub fn is_strava_rate_limit(&self) -> bool {
        matches!(self, AppError::StravaApi(msg) if msg == Self::STRAVA_RATE_LIMIT)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
