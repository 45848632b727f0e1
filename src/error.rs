//! Error types for mailwarden.

use std::time::Duration;

/// Job store errors.
///
/// These are the only failures allowed past the worker's per-job boundary,
/// and even then they are retried with backoff rather than terminating.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store file at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error("Job {id} in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: String,
        state: String,
        target: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// ML scorer errors. Callers treat any of these as "no signal".
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("Scorer request failed: {0}")]
    RequestFailed(String),

    #[error("Scorer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid scorer response: {0}")]
    InvalidResponse(String),

    #[error("Scorer returned out-of-range probability {0}")]
    OutOfRange(f64),
}

/// Ingestion-boundary errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
