//! pm_dose tool implementation.
//!
//! Answers one dose question from persisted evidence. The proposal comes
//! from the oracle but the reply to the caller always comes from the
//! deterministic safety gate; an unusable entry or a failed oracle call
//! produces a typed BLOCK decision, not a protocol error.

use chrono::{DateTime, Utc};
use pmdex_client::dose::{self, DoseCandidate, DoseContext, DoseDecision, Patient};
use pmdex_client::fetch::FetchConfig;
use pmdex_client::oracle::DoseOracle;
use pmdex_client::{DocumentFetcher, OracleClient, Pipeline, recover_json};
use pmdex_core::config::AppConfig;
use pmdex_core::{CacheDb, EntryStatus, Error, EvidenceSet};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Patient inputs for the pm_dose tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PatientParams {
    /// Age in years.
    #[serde(default)]
    pub age: Option<f64>,
    /// Weight in kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Input parameters for the pm_dose tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PmDoseParams {
    /// The monograph key, e.g. a drug identification number.
    pub key: String,

    #[serde(default)]
    pub patient: PatientParams,

    /// Milligrams already taken in the current 24-hour window.
    #[serde(default)]
    pub last_dose_mg: Option<f64>,

    /// RFC3339 timestamp of the most recent dose.
    #[serde(default)]
    pub last_dose_time: Option<String>,

    /// Free-form caller context passed along to the proposal.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Output structure for the pm_dose tool.
#[derive(Debug, Clone, Serialize)]
pub struct PmDoseOutput {
    pub key: String,
    #[serde(flatten)]
    pub decision: DoseDecision,
}

fn reply(key: &str, decision: DoseDecision) -> Result<CallToolResult, McpError> {
    let output = PmDoseOutput { key: key.to_string(), decision };
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}

/// Parse the oracle's dose reply into a candidate the gate can judge.
fn parse_candidate(raw: &str) -> Result<DoseCandidate, Error> {
    let value = recover_json(raw)?;
    serde_json::from_value(value).map_err(|e| Error::OracleMalformed(format!("dose proposal did not parse: {e}")))
}

/// Implementation of the pm_dose tool.
pub async fn dose_impl(db: &CacheDb, config: &AppConfig, params: PmDoseParams) -> Result<CallToolResult, McpError> {
    if params.key.trim().is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let last_dose_time: Option<DateTime<Utc>> = match params.last_dose_time.as_deref() {
        None => None,
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Error::InvalidInput(format!("last_dose_time is not RFC3339: {e}")))?,
        ),
    };

    let patient = Patient {
        age: params.patient.age,
        weight: params.patient.weight,
        gender: params.patient.gender.clone(),
    };

    // Implausible inputs never reach the oracle.
    let finding = dose::plausibility::assess(patient.age, patient.weight);
    if finding.status == dose::DoseStatus::Block {
        return reply(&params.key, DoseDecision::blocked(finding.notes));
    }

    let evidence = match resolve_evidence(db, config, &params.key).await? {
        Ok(evidence) => evidence,
        Err(decision) => return reply(&params.key, decision),
    };

    let oracle = OracleClient::from_app(config).map_err(Error::from)?;
    let patient_json = serde_json::json!({
        "age": patient.age,
        "weight": patient.weight,
        "gender": patient.gender,
        "notes": params.notes,
    })
    .to_string();

    let candidate = match oracle.propose_dose(&params.key, &patient_json, &evidence).await {
        Ok(raw) => match parse_candidate(&raw) {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!("dose proposal for {} was unusable: {}", params.key, e);
                return reply(
                    &params.key,
                    DoseDecision::blocked(vec![format!("dose proposal was unusable: {e}")]),
                );
            }
        },
        Err(e) => {
            tracing::warn!("dose proposal call failed for {}: {}", params.key, e);
            return reply(&params.key, DoseDecision::blocked(vec![format!("dose proposal failed: {e}")]));
        }
    };

    let context = DoseContext { last_dose_mg: params.last_dose_mg, last_dose_time };
    let decision = dose::gate(&patient, &candidate, &context, &evidence);

    reply(&params.key, decision)
}

/// Resolve the entry for a key and return its evidence, or the BLOCK
/// decision explaining why no dose can be given.
async fn resolve_evidence(
    db: &CacheDb, config: &AppConfig, key: &str,
) -> Result<Result<EvidenceSet, DoseDecision>, McpError> {
    let oracle = OracleClient::from_app(config).map_err(Error::from)?;
    let fetcher = DocumentFetcher::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.fetch_timeout(),
        ..Default::default()
    })?;

    let pipeline = Pipeline::new(db.clone(), oracle, fetcher, Some(config.source_uri_template.clone()));
    let source_uri = config.source_uri_for(key);
    let entry = pipeline.resolve(key, Some(&source_uri), false).await?;

    if entry.status != EntryStatus::Ok {
        return Ok(Err(DoseDecision::blocked(vec![format!(
            "no usable extraction for {key}: entry status is {}",
            entry.status.as_str()
        )])));
    }

    match entry.extraction {
        Some(evidence) if !evidence.is_empty() => Ok(Ok(evidence)),
        _ => Ok(Err(DoseDecision::blocked(vec![format!(
            "no usable extraction for {key}: entry holds no evidence"
        )]))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmdex_client::DoseStatus;

    #[tokio::test]
    async fn test_dose_empty_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { oracle_api_key: Some("test-key".into()), ..Default::default() };
        let params = PmDoseParams {
            key: "".into(),
            patient: PatientParams::default(),
            last_dose_mg: None,
            last_dose_time: None,
            notes: None,
        };

        let result = dose_impl(&db, &config, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dose_rejects_bad_timestamp() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { oracle_api_key: Some("test-key".into()), ..Default::default() };
        let params = PmDoseParams {
            key: "02247521".into(),
            patient: PatientParams::default(),
            last_dose_mg: Some(500.0),
            last_dose_time: Some("yesterday at noon".into()),
            notes: None,
        };

        let result = dose_impl(&db, &config, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_implausible_patient_blocks_without_oracle() {
        // No oracle key is configured; a protocol error would surface if the
        // oracle were consulted before the plausibility check.
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig::default();
        let params = PmDoseParams {
            key: "02247521".into(),
            patient: PatientParams { age: Some(1.0), weight: Some(30.0), gender: None },
            last_dose_mg: None,
            last_dose_time: None,
            notes: None,
        };

        let result = dose_impl(&db, &config, params).await.unwrap();
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["status"], "BLOCK");
        assert!(value["suggested_dose_mg"].is_null());
    }

    #[test]
    fn test_parse_candidate_tolerates_noise() {
        let raw = "Here is the proposal: {\"status\": \"OK\", \"suggested_dose_mg\": 500, \"interval_hours\": 6,} done";
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.status, Some(DoseStatus::Ok));
        assert_eq!(candidate.suggested_dose_mg, Some(500.0));
    }
}
