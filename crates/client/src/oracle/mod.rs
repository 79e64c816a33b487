//! Extraction oracle client.
//!
//! Wraps one call to the external reasoning capability behind a hard per-call
//! timeout and a text-in/JSON-out contract. The client has three instruction
//! modes: full extraction, repair (prior set + named gaps), and syntax-only
//! JSON repair; a fourth builder produces the one-shot dose proposal used by
//! the dose tool.
//!
//! The pipeline consumes the client through the [`ExtractionOracle`] and
//! [`DoseOracle`] traits so it can be exercised without a network.

pub mod error;
pub mod instructions;
pub mod request;
pub mod response;

pub use error::OracleError;
pub use request::{ChatMessage, ChatRequest};
pub use response::ChatResponse;

use async_trait::async_trait;
use pmdex_core::EvidenceSet;
use pmdex_core::config::AppConfig;
use pmdex_core::evidence::coverage::CategoryGap;
use reqwest::header;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default base URL for the oracle API.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Hard per-call timeout; a call past this is abandoned, not retried.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "pmdex/0.1";

/// Minimum interval between oracle calls.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// Oracle client configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// API key from PMDEX_ORACLE_API_KEY.
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Hard per-call timeout (default: 45s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl OracleConfig {
    /// Build from the application configuration.
    ///
    /// Returns `MissingApiKey` if no key is configured.
    pub fn from_app(config: &AppConfig) -> Result<Self, OracleError> {
        let api_key = config
            .require_oracle_api_key()
            .map_err(|_| OracleError::MissingApiKey)?
            .to_string();

        Ok(Self {
            api_key,
            base_url: config.oracle_base_url.clone(),
            model: config.oracle_model.clone(),
            timeout: config.oracle_timeout(),
            user_agent: config.user_agent.clone(),
        })
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// Seam the extraction pipeline consumes; implemented by [`OracleClient`]
/// and by test doubles.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Full extraction from the document, producing the EvidenceSet shape.
    async fn full_extraction(&self, doc_ref: &str) -> Result<String, OracleError>;

    /// Repair pass: preserve prior entries, fill only the named gaps.
    async fn repair(&self, doc_ref: &str, current: &EvidenceSet, gaps: &[CategoryGap]) -> Result<String, OracleError>;

    /// Fix only JSON syntax, adding no information.
    async fn fix_syntax(&self, raw: &str) -> Result<String, OracleError>;
}

/// Seam for the one-shot dose proposal call.
#[async_trait]
pub trait DoseOracle: Send + Sync {
    async fn propose_dose(&self, key: &str, patient_json: &str, evidence: &EvidenceSet)
    -> Result<String, OracleError>;
}

/// Extraction oracle API client.
#[derive(Debug, Clone)]
pub struct OracleClient {
    http: reqwest::Client,
    config: OracleConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl OracleClient {
    /// Create a new oracle client with the given configuration.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_key.is_empty() {
            return Err(OracleError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| OracleError::Network(Arc::new(e)))?;

        Ok(Self { http, config, rate_limiter: Arc::new(RateLimiter::new(MIN_REQUEST_INTERVAL)) })
    }

    /// Create a client from the application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, OracleError> {
        Self::new(OracleConfig::from_app(config)?)
    }

    /// Execute one completion call under the hard timeout.
    ///
    /// The tokio timeout wraps the whole request so a stalled response body
    /// is abandoned too, not just a slow connect.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let req = ChatRequest::new(&self.config.model, system, user);
        req.validate()?;

        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url);

        tracing::debug!("oracle call: model={}", self.config.model);

        let send = async {
            let http_response = self
                .http
                .post(&url)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                .header("Accept", "application/json")
                .json(&req)
                .send()
                .await?;

            let status = http_response.status();
            tracing::debug!("oracle response status: {}", status);

            if status == 401 || status == 403 {
                return Err(OracleError::AuthError);
            }
            if status == 429 {
                return Err(OracleError::RateLimited);
            }
            if status.is_client_error() || status.is_server_error() {
                return Err(OracleError::UpstreamRejected { status: status.as_u16() });
            }

            let bytes = http_response.bytes().await?;
            let envelope: ChatResponse =
                serde_json::from_slice(&bytes).map_err(|e| OracleError::Parse(e.to_string()))?;

            envelope.text().ok_or(OracleError::Empty)
        };

        let text = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| OracleError::Timeout(self.config.timeout))??;

        tracing::debug!("oracle call completed in {:?} ({} chars)", start.elapsed(), text.len());

        Ok(text)
    }
}

#[async_trait]
impl ExtractionOracle for OracleClient {
    async fn full_extraction(&self, doc_ref: &str) -> Result<String, OracleError> {
        let (system, user) = instructions::extraction(doc_ref);
        self.complete(&system, &user).await
    }

    async fn repair(&self, doc_ref: &str, current: &EvidenceSet, gaps: &[CategoryGap]) -> Result<String, OracleError> {
        let (system, user) = instructions::repair(doc_ref, current, gaps);
        self.complete(&system, &user).await
    }

    async fn fix_syntax(&self, raw: &str) -> Result<String, OracleError> {
        let (system, user) = instructions::syntax_repair(raw);
        self.complete(&system, &user).await
    }
}

#[async_trait]
impl DoseOracle for OracleClient {
    async fn propose_dose(
        &self, key: &str, patient_json: &str, evidence: &EvidenceSet,
    ) -> Result<String, OracleError> {
        let (system, user) = instructions::dose_proposal(key, patient_json, evidence);
        self.complete(&system, &user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new_missing_key() {
        let config = OracleConfig::default();
        let result = OracleClient::new(config);
        assert!(matches!(result, Err(OracleError::MissingApiKey)));
    }

    #[test]
    fn test_from_app_missing_key() {
        let app = AppConfig::default();
        assert!(matches!(OracleConfig::from_app(&app), Err(OracleError::MissingApiKey)));
    }

    #[test]
    fn test_from_app_carries_settings() {
        let app = AppConfig {
            oracle_api_key: Some("test-key".into()),
            oracle_model: "test-model".into(),
            oracle_timeout_ms: 30_000,
            ..Default::default()
        };

        let config = OracleConfig::from_app(&app).unwrap();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "test-model");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_rate_limiter_enforces_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
