//! Centralized error types for the On Air core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::feed::FetchError;
use crate::playback::PlaybackError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for FetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::Status(_) => "http_error_status",
            Self::Malformed(_) => "feed_malformed",
        }
    }
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoBroadcast(_) => "no_broadcast",
            Self::Rejected(_) => "playback_rejected",
            Self::NoBroadcastsYet => "no_broadcasts_yet",
            Self::Unavailable => "audio_unavailable",
        }
    }
}

/// Application-wide error type for the On Air server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum OnAirError {
    /// A playback intent failed.
    #[error(transparent)]
    Playback(PlaybackError),

    /// A feed fetch failed.
    #[error(transparent)]
    Fetch(FetchError),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The station task is not running (shutting down or crashed).
    #[error("Station unavailable: {0}")]
    StationUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error (missing or invalid settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OnAirError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Playback(e) => e.code(),
            Self::Fetch(e) => e.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::StationUnavailable(_) => "station_unavailable",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Playback(PlaybackError::NoBroadcast(_)) => StatusCode::NOT_FOUND,
            Self::Playback(PlaybackError::NoBroadcastsYet | PlaybackError::Rejected(_)) => {
                StatusCode::CONFLICT
            }
            Self::Playback(PlaybackError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StationUnavailable(_) | Self::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::feed::FetchResult;
pub use crate::playback::PlaybackResult;

/// Convenient Result alias for application-wide operations.
pub type OnAirResult<T> = Result<T, OnAirError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for OnAirError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlaybackError> for OnAirError {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err)
    }
}

impl From<FetchError> for OnAirError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}
