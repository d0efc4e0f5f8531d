//! Common error types for the FMEA worksheet core

use serde::Serialize;
use thiserror::Error;

/// Common result type for FMEA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the worksheet crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested analysis not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload rejected before any transaction was opened
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Storage unreachable, busy or past its deadline; safe to retry
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure classification reported to callers of the save/load contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Retry later or fall back to a local cache
    TransientStore,
    /// Fix the payload; nothing was written
    MalformedInput,
    /// Analysis key does not exist
    NotFound,
    /// Anything else
    Internal,
}

impl Error {
    /// Classify this error for the response contract
    pub fn class(&self) -> FailureClass {
        match self {
            Error::Database(e) => classify_sqlx(e),
            Error::Io(_) | Error::Transient(_) => FailureClass::TransientStore,
            Error::MalformedInput(_) => FailureClass::MalformedInput,
            Error::NotFound(_) => FailureClass::NotFound,
            Error::Serialization(_) | Error::Config(_) | Error::Internal(_) => {
                FailureClass::Internal
            }
        }
    }

    /// True when the same request may succeed if retried unchanged
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::TransientStore
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes are contention,
/// not application errors.
fn classify_sqlx(err: &sqlx::Error) -> FailureClass {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_) => FailureClass::TransientStore,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517") => {
                FailureClass::TransientStore
            }
            _ => FailureClass::Internal,
        },
        _ => FailureClass::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            Error::MalformedInput("x".into()).class(),
            FailureClass::MalformedInput
        );
        assert!(Error::Transient("deadline".into()).is_transient());
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert_eq!(
            Error::Database(sqlx::Error::RowNotFound).class(),
            FailureClass::Internal
        );
        assert_eq!(Error::NotFound("A".into()).class(), FailureClass::NotFound);
    }
}
