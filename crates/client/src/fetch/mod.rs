//! Monograph PDF fetch pipeline with retry, backoff, and validation.
//!
//! ### Retry discipline
//! - Up to 4 attempts per fetch.
//! - Exponential backoff: base 300ms doubling per attempt, ±250ms jitter.
//! - Network errors and non-2xx responses are transient and retried.
//! - A body that does not start with the `%PDF` magic header is a permanent
//!   failure and is not retried.
//!
//! ### Validation & fingerprinting
//! - Max body bytes enforced (configurable).
//! - SHA-256 content fingerprint computed over the full byte stream.
//! - `probe` issues a range request and checks only the magic header, for
//!   cheap link validation before committing to a full download.

use bytes::Bytes;
use rand::Rng;
use reqwest::{Client, StatusCode, Url, header};
use std::future::Future;
use std::time::{Duration, Instant};

use pmdex_core::Error;
use pmdex_core::cache::content_fingerprint;

/// First bytes of every PDF document.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Configuration for the document fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pmdex/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout per attempt (default: 20s)
    pub timeout: Duration,

    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pmdex/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 4).
    pub max_attempts: u32,
    /// Base delay before the second attempt (default: 300ms).
    pub base_delay: Duration,
    /// Uniform jitter applied to each delay (default: ±250ms).
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay: Duration::from_millis(300), jitter: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as i64 * (1i64 << (attempt - 1).min(16));
        let jitter_ms = self.jitter.as_millis() as i64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(-jitter_ms..=jitter_ms)
        } else {
            0
        };
        Duration::from_millis((base + jitter).max(0) as u64)
    }
}

/// Run `attempt` under the retry policy.
///
/// Transient errors are retried until the budget is exhausted and then
/// surfaced as `FetchExhausted`; permanent errors short-circuit.
pub async fn fetch_with_retry<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err: Option<Error> = None;

    for n in 1..=policy.max_attempts.max(1) {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                tracing::debug!("fetch attempt {}/{} failed: {}", n, policy.max_attempts, e);
                if n < policy.max_attempts {
                    tokio::time::sleep(policy.delay_after(n)).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    let detail = last_err.map(|e| e.to_string()).unwrap_or_else(|| "no attempts made".into());
    Err(Error::FetchExhausted(format!(
        "fetch failed after {} attempts: {}",
        policy.max_attempts, detail
    )))
}

/// A fetched and validated source document.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    /// The URI requested.
    pub uri: Url,
    /// The final URI after redirects.
    pub final_uri: Url,
    /// HTTP status of the successful response.
    pub status: StatusCode,
    /// Full document bytes.
    pub bytes: Bytes,
    /// SHA-256 hex fingerprint over `bytes`.
    pub fingerprint: String,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

/// Validate the structural signature of the expected document type.
fn validate_magic(bytes: &[u8]) -> Result<(), Error> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(Error::FetchPermanent("response is not a PDF (missing %PDF magic header)".into()));
    }
    Ok(())
}

/// HTTP fetcher for monograph PDFs.
pub struct DocumentFetcher {
    http: Client,
    config: FetchConfig,
}

impl DocumentFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchPermanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Fetch a document, retrying transient failures up to the budget.
    pub async fn fetch(&self, uri_str: &str) -> Result<PdfDocument, Error> {
        let uri = Url::parse(uri_str).map_err(|e| Error::FetchPermanent(format!("invalid URI {uri_str}: {e}")))?;

        fetch_with_retry(&self.config.retry, |_| self.attempt(uri.clone())).await
    }

    async fn attempt(&self, uri: Url) -> Result<PdfDocument, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(uri.as_str())
            .header("Accept", "application/pdf,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| Error::FetchTransient(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchTransient(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchPermanent(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_uri = response.url().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchTransient(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchPermanent(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        validate_magic(&bytes)?;

        let fingerprint = content_fingerprint(&bytes);
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", uri, final_uri, fetch_ms, bytes.len());

        Ok(PdfDocument { uri, final_uri, status, bytes, fingerprint, fetch_ms })
    }

    /// Cheap single-attempt check that a URI points at a PDF.
    ///
    /// Issues a range request for the first KiB and checks the magic header
    /// only; no fingerprint is computed.
    pub async fn probe(&self, uri_str: &str) -> Result<bool, Error> {
        let uri = Url::parse(uri_str).map_err(|e| Error::FetchPermanent(format!("invalid URI {uri_str}: {e}")))?;

        let response = self
            .http
            .get(uri.as_str())
            .header(header::RANGE, "bytes=0-1023")
            .send()
            .await
            .map_err(|e| Error::FetchTransient(format!("network error: {e}")))?;

        let status = response.status();
        if !(status.is_success() || status == StatusCode::PARTIAL_CONTENT) {
            return Err(Error::FetchTransient(format!("status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchTransient(format!("failed to read response: {e}")))?;

        Ok(validate_magic(&bytes).is_ok())
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
