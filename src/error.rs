//! Error types for the ingestion pipeline, built with `thiserror`.

use std::time::Duration;
use thiserror::Error;

/// Request-level failure kinds
#[derive(Debug, Error)]
pub enum IngestError {
    /// Authentication failed, nothing was decoded
    #[error("invalid authorization token")]
    InvalidToken,

    /// Neither TTN v2 nor TTN v3 envelope shape present
    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    #[error("store connection aborted: {0}")]
    StoreConnectionAborted(String),

    #[error("store write timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("store rejected the write: {0}")]
    StoreRejected(String),
}

impl IngestError {
    /// Status returned at the request boundary
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::InvalidToken => 401,
            _ => 500,
        }
    }

    /// Short human-readable message returned at the request boundary
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::InvalidToken => "Invalid authorization token. Operation denied",
            IngestError::MalformedRequest(_) => "Malformed request body",
            IngestError::StoreConnectionAborted(_) => {
                "The connection with the time-series database was aborted"
            }
            IngestError::StoreTimeout(_) => {
                "The connection with the time-series database timed out"
            }
            IngestError::StoreRejected(_) => {
                "An error occurred while writing to the time-series database"
            }
        }
    }
}

/// Failures reported by a time-series store client
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection aborted: {0}")]
    ConnectionAborted(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConnectionAborted(msg) => IngestError::StoreConnectionAborted(msg),
            StoreError::Rejected(msg) => IngestError::StoreRejected(msg),
        }
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.as_db_error().is_some() {
            StoreError::Rejected(e.to_string())
        } else {
            StoreError::ConnectionAborted(e.to_string())
        }
    }
}

/// Payload encoder failures
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u8),

    #[error("value {value} for {field} does not fit in {width} byte(s)")]
    ValueOutOfRange {
        field: &'static str,
        value: String,
        width: usize,
    },

    #[error("version {version} packets carry at most {max} samples, got {got}")]
    TooManySamples { version: u8, max: usize, got: usize },

    #[error("first sample offset {0} collides with a fixed-once tag code")]
    AmbiguousOffset(u8),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Result type alias for ingestion
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invalid_token_maps_to_401() {
        assert_eq!(IngestError::InvalidToken.status_code(), 401);
        assert_eq!(IngestError::MalformedRequest("x".into()).status_code(), 500);
        assert_eq!(
            IngestError::StoreTimeout(Duration::from_secs(1)).status_code(),
            500
        );
        assert_eq!(IngestError::StoreRejected("x".into()).status_code(), 500);
    }

    #[test]
    fn test_store_error_kinds_stay_distinct() {
        let aborted: IngestError = StoreError::ConnectionAborted("reset".into()).into();
        let rejected: IngestError = StoreError::Rejected("bad row".into()).into();
        assert!(matches!(aborted, IngestError::StoreConnectionAborted(_)));
        assert!(matches!(rejected, IngestError::StoreRejected(_)));
    }
}
