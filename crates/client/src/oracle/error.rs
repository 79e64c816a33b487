//! Extraction oracle client error types.

use std::sync::Arc;

/// Errors from the extraction oracle client.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Missing PMDEX_ORACLE_API_KEY configuration.
    #[error("missing API key: PMDEX_ORACLE_API_KEY not set")]
    MissingApiKey,

    /// Invalid instruction payload.
    #[error("invalid instructions: {0}")]
    InvalidInstructions(String),

    /// Call exceeded the hard per-call timeout and was abandoned.
    #[error("oracle call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by the oracle API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Upstream rejected the call with an HTTP error.
    #[error("upstream rejected call: HTTP {status}")]
    UpstreamRejected { status: u16 },

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response envelope did not parse.
    #[error("malformed response envelope: {0}")]
    Parse(String),

    /// Response contained no completion text.
    #[error("empty completion")]
    Empty,
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout(std::time::Duration::ZERO)
        } else {
            OracleError::Network(Arc::new(err))
        }
    }
}

impl From<OracleError> for pmdex_core::Error {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout(d) => pmdex_core::Error::OracleTimeout(format!("oracle call timed out after {d:?}")),
            OracleError::Parse(msg) => pmdex_core::Error::OracleMalformed(msg),
            OracleError::Empty => pmdex_core::Error::OracleMalformed("empty completion".into()),
            other => pmdex_core::Error::OracleRejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OracleError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = OracleError::UpstreamRejected { status: 502 };
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_conversion_to_core_error() {
        let core: pmdex_core::Error = OracleError::Empty.into();
        assert!(matches!(core, pmdex_core::Error::OracleMalformed(_)));

        let core: pmdex_core::Error = OracleError::RateLimited.into();
        assert!(matches!(core, pmdex_core::Error::OracleRejected(_)));
    }
}
