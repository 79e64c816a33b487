//! Application configuration with layered loading.
//!
//! Configuration management using figment for layered loading from
//! multiple sources:
//!
//! 1. Environment variables (PMDEX_*)
//! 2. TOML config file (if PMDEX_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PMDEX_*)
/// 2. TOML config file (if PMDEX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the extraction oracle.
    ///
    /// Set via PMDEX_ORACLE_API_KEY environment variable.
    /// Required only when an extraction or dose call actually runs.
    #[serde(default)]
    pub oracle_api_key: Option<String>,

    /// Base URL of the oracle's chat completions API.
    ///
    /// Set via PMDEX_ORACLE_BASE_URL environment variable.
    #[serde(default = "default_oracle_base_url")]
    pub oracle_base_url: String,

    /// Model identifier passed to the oracle.
    ///
    /// Set via PMDEX_ORACLE_MODEL environment variable.
    #[serde(default = "default_oracle_model")]
    pub oracle_model: String,

    /// Hard per-call oracle timeout in milliseconds.
    ///
    /// Set via PMDEX_ORACLE_TIMEOUT_MS environment variable.
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,

    /// Path to SQLite cache database.
    ///
    /// Set via PMDEX_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PMDEX_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per document.
    ///
    /// Set via PMDEX_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Document fetch timeout per attempt, in milliseconds.
    ///
    /// Set via PMDEX_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// URI template for monograph PDFs when an entry has no explicit
    /// source URI; `{key}` is replaced with the document key.
    ///
    /// Set via PMDEX_SOURCE_URI_TEMPLATE environment variable.
    #[serde(default = "default_source_uri_template")]
    pub source_uri_template: String,
}

fn default_oracle_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_oracle_model() -> String {
    "gpt-4o-mini".into()
}

fn default_oracle_timeout_ms() -> u64 {
    45_000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pmdex-cache.sqlite")
}

fn default_user_agent() -> String {
    "pmdex/0.1".into()
}

fn default_max_bytes() -> usize {
    20_971_520 // 20MB; monograph PDFs run large
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_source_uri_template() -> String {
    "https://pdf.hres.ca/dpd_pm/{key}.PDF".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oracle_api_key: None,
            oracle_base_url: default_oracle_base_url(),
            oracle_model: default_oracle_model(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            source_uri_template: default_source_uri_template(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Oracle timeout as Duration.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Resolve the source URI for a key from the configured template.
    pub fn source_uri_for(&self, key: &str) -> String {
        self.source_uri_template.replace("{key}", key)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PMDEX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PMDEX_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check the oracle API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the oracle API key is not set.
    pub fn require_oracle_api_key(&self) -> Result<&str, ConfigError> {
        self.oracle_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "oracle_api_key".into(),
            hint: "Set PMDEX_ORACLE_API_KEY environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pmdex-cache.sqlite"));
        assert_eq!(config.user_agent, "pmdex/0.1");
        assert_eq!(config.max_bytes, 20_971_520);
        assert_eq!(config.fetch_timeout_ms, 20_000);
        assert_eq!(config.oracle_timeout_ms, 45_000);
        assert!(config.oracle_api_key.is_none());
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_millis(20_000));
        assert_eq!(config.oracle_timeout(), Duration::from_millis(45_000));
    }

    #[test]
    fn test_source_uri_for() {
        let config = AppConfig::default();
        assert_eq!(config.source_uri_for("12345"), "https://pdf.hres.ca/dpd_pm/12345.PDF");
    }

    #[test]
    fn test_require_oracle_api_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_oracle_api_key(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_oracle_api_key_present() {
        let config = AppConfig { oracle_api_key: Some("test-key".into()), ..Default::default() };
        assert_eq!(config.require_oracle_api_key().unwrap(), "test-key");
    }
}
