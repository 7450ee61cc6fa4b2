//! Crate-wide error type.
//!
//! Variants follow the recovery policy of the sweep and retrieval loops:
//! - `Conflict` is recovered by get-or-create callers and only escapes from
//!   the append-only cache when a key is written twice.
//! - `InvalidQuery` is recorded as a sentinel performance, never retried.
//! - `Transient`, `Network` and model timeouts are retried by the outer loop.
//! - `Invariant` is a caller bug and is never retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite failure that is not a uniqueness conflict.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Config file missing, unparsable or out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A natural key was written twice.
    #[error("Conflict: {what} already exists")]
    Conflict { what: String },

    /// The search endpoint rejected the query as malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Retryable failure (rate limit, 5xx, timeout).
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A pluggable model failed.
    #[error("Model error: {strategy}: {message}")]
    Model { strategy: String, message: String },

    /// A looked-up row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Programming error: the caller broke a contract.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub fn model(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model { strategy: strategy.into(), message: message.into() }
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict { what: what.into() }
    }

    /// Whether the outer retry loop may try the whole command again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Network(_) | Error::Model { .. } => true,
            Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// True when SQLite refused a write because of a UNIQUE/PK constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

pub type Result<T> = std::result::Result<T, Error>;
