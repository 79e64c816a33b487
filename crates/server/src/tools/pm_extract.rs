//! pm_extract tool implementation.
//!
//! Resolves a monograph key through the cache state machine and returns the
//! persisted evidence. An already-OK entry is served from the cache unless
//! the caller forces a refresh.

use pmdex_client::fetch::FetchConfig;
use pmdex_client::{DocumentFetcher, OracleClient, Pipeline};
use pmdex_core::config::AppConfig;
use pmdex_core::{CacheDb, EntryStatus, Error, EvidenceSet};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the pm_extract tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PmExtractParams {
    /// The monograph key, e.g. a drug identification number.
    pub key: String,

    /// Explicit source document URI. When absent the configured URI
    /// template is applied to the key.
    #[serde(default)]
    pub source_uri: Option<String>,

    /// Re-fetch and re-extract even if the entry is already OK or NO_PDF.
    #[serde(default)]
    pub refresh: bool,
}

/// Output structure for the pm_extract tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PmExtractOutput {
    pub key: String,
    pub status: EntryStatus,
    pub source_uri: Option<String>,
    /// SHA-256 hex fingerprint of the last successfully fetched document.
    pub content_fingerprint: Option<String>,
    pub fetched_at: Option<String>,
    pub parsed_at: Option<String>,
    /// The persisted evidence, present when status is OK.
    pub evidence: Option<EvidenceSet>,
    /// Failure detail for terminal failure states.
    pub error: Option<String>,
}

/// Implementation of the pm_extract tool.
pub async fn extract_impl(db: &CacheDb, config: &AppConfig, params: PmExtractParams) -> Result<CallToolResult, McpError> {
    if params.key.trim().is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let oracle = OracleClient::from_app(config).map_err(Error::from)?;
    let fetcher = DocumentFetcher::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.fetch_timeout(),
        ..Default::default()
    })?;

    // An explicit caller URI wins; otherwise the configured template
    // resolves one for the key.
    let source_uri = match &params.source_uri {
        Some(uri) => uri.clone(),
        None => config.source_uri_for(&params.key),
    };

    let pipeline = Pipeline::new(db.clone(), oracle, fetcher, Some(config.source_uri_template.clone()));
    let entry = pipeline
        .resolve(&params.key, Some(&source_uri), params.refresh)
        .await?;

    let output = PmExtractOutput {
        key: entry.key,
        status: entry.status,
        source_uri: entry.source_uri,
        content_fingerprint: entry.content_fingerprint,
        fetched_at: entry.fetched_at,
        parsed_at: entry.parsed_at,
        evidence: entry.extraction,
        error: entry.error,
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
