// src/error.rs
//! Error taxonomy shared by the pipeline components.
//!
//! Provider errors never cross into the state machine: `generate` and
//! `ingest` convert them into in-band outcomes (sentinel candidate, fallback
//! headlines). Only storage failures propagate out of a daily run.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure reported by an outbound provider (news or generative text).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rate limited the request")]
    RateLimited,

    #[error("provider call timed out")]
    Timeout,

    /// Transport failure or a 5xx-equivalent status.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Empty, undecodable, or otherwise unusable response body.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Retry with backoff applies to these; `Malformed` is retried immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Timeout | ProviderError::Unavailable(_)
        )
    }

    /// Map an HTTP status to the matching provider failure.
    pub fn from_status(status: reqwest::StatusCode, body_hint: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimited
        } else if status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::GATEWAY_TIMEOUT
        {
            ProviderError::Timeout
        } else if status.is_server_error() {
            ProviderError::Unavailable(format!("status {status}"))
        } else {
            ProviderError::Malformed(format!("status {status}: {}", truncate(body_hint, 120)))
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

/// Failure reported by a [`crate::store::Datastore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A row for this date already exists (conditional write lost).
    #[error("compliment for {0} already stored")]
    DuplicateKey(NaiveDate),

    #[error("storage i/o: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// The only error a daily run surfaces to its caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DailyError {
    #[error("storage failure for {date}: {source}")]
    Storage {
        date: NaiveDate,
        #[source]
        source: StoreError,
    },
}

/// Classification used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ProviderTransient,
    ProviderInvalidResponse,
    GenerationExhausted,
    DuplicateExhausted,
    StorageFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProviderTransient => "provider_transient",
            FailureKind::ProviderInvalidResponse => "provider_invalid_response",
            FailureKind::GenerationExhausted => "generation_exhausted",
            FailureKind::DuplicateExhausted => "duplicate_exhausted",
            FailureKind::StorageFailure => "storage_failure",
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_separates_transient_from_malformed() {
        let rl = ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(rl, ProviderError::RateLimited);
        assert!(rl.is_transient());

        let five = ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(five.is_transient());

        let bad = ProviderError::from_status(reqwest::StatusCode::BAD_REQUEST, "oops");
        assert!(!bad.is_transient());
        assert!(matches!(bad, ProviderError::Malformed(_)));
    }
}
