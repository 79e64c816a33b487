//! Unified error types for pmdex.
//!
//! One taxonomy is shared by the store, the document fetcher, and the
//! extraction pipeline. Fetch failures are split into transient (retried
//! internally) and permanent (never retried) variants; the distinction
//! drives the retry loop, not the caller.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the pmdex pipeline and store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No source document URI resolves for the key.
    #[error("NO_PDF: {0}")]
    NoDocument(String),

    /// Fetch failed in a way that is worth retrying (network, non-2xx).
    #[error("FETCH_TRANSIENT: {0}")]
    FetchTransient(String),

    /// Fetch failed in a way retries cannot fix (bad URI, wrong magic header).
    #[error("FETCH_PERMANENT: {0}")]
    FetchPermanent(String),

    /// Retry budget exhausted; last transient error attached.
    #[error("FETCH_FAIL: {0}")]
    FetchExhausted(String),

    /// Oracle call timed out and was abandoned.
    #[error("ORACLE_TIMEOUT: {0}")]
    OracleTimeout(String),

    /// Oracle output could not be parsed even after syntax repair.
    #[error("ORACLE_MALFORMED: {0}")]
    OracleMalformed(String),

    /// Oracle upstream rejected the call (auth, rate limit, 5xx).
    #[error("ORACLE_REJECTED: {0}")]
    OracleRejected(String),

    /// Extraction produced an empty evidence set after all repair attempts.
    #[error("PARSE_FAIL: {0}")]
    ParseFailed(String),

    /// Another worker advanced the cache entry first.
    #[error("CONFLICT: entry {0} was updated concurrently")]
    Conflict(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored extraction column did not deserialize as an EvidenceSet.
    #[error("CACHE_ERROR: corrupt extraction for {0}")]
    CorruptExtraction(String),
}

impl Error {
    /// Whether the fetch retry loop should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::FetchTransient(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NoDocument(msg) => (-32000, msg.clone()),
            Error::FetchTransient(msg) => (-32001, msg.clone()),
            Error::FetchPermanent(msg) => (-32002, msg.clone()),
            Error::FetchExhausted(msg) => (-32003, msg.clone()),
            Error::OracleTimeout(msg) => (-32004, msg.clone()),
            Error::OracleMalformed(msg) => (-32005, msg.clone()),
            Error::OracleRejected(msg) => (-32006, msg.clone()),
            Error::ParseFailed(msg) => (-32007, msg.clone()),
            Error::Conflict(key) => (-32008, format!("entry {key} was updated concurrently")),
            Error::CacheMiss(msg) => (-32009, msg.clone()),
            Error::Database(e) => (-32010, e.to_string()),
            Error::MigrationFailed(msg) => (-32010, msg.clone()),
            Error::CorruptExtraction(key) => (-32010, format!("corrupt extraction for {key}")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("02247521".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("02247521"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::FetchTransient("status 503".into()).is_transient());
        assert!(!Error::FetchPermanent("not a PDF".into()).is_transient());
        assert!(!Error::OracleTimeout("45s".into()).is_transient());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::NoDocument("no monograph for key".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32000);
    }
}
