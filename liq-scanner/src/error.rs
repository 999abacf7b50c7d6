//! Error types for liq-scanner
//!
//! Scan rejections are ordinary outcomes (see `session::MatchOutcome`), not
//! errors. The enums here cover the failures that can leave no trace unless
//! they are reported: manifest loads, submissions and the ledger cache.

use thiserror::Error;

/// Manifest load failures
///
/// The previous manifest always stays in place when one of these occurs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend answered but flagged the response as not ok
    #[error("Backend rejected manifest request")]
    Rejected,
}

/// Submission failures
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No aggregate bucket has entries; nothing was sent
    #[error("No scanned groups to submit")]
    Empty,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Http(u16),
}

/// Ledger cache failures
///
/// Callers degrade to an in-memory session; the kind is kept for logging.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache decode error: {0}")]
    Decode(String),

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Short label for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Decode(_) => "decode",
            CacheError::Io(_) => "io",
        }
    }
}

/// The scheduler task is no longer running
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler stopped")]
    Closed,
}
