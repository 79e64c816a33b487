//! Typed evidence model for extracted monograph content.
//!
//! An `EvidenceSet` is the single validated shape the rest of the system
//! consumes. It is checked once at the store boundary; downstream code never
//! re-validates loose JSON. Only the evidence-block schema (version 3) is
//! supported.

pub mod coverage;
pub mod dedupe;

use serde::{Deserialize, Serialize};

/// Schema version persisted alongside every extraction.
pub const EVIDENCE_SCHEMA_VERSION: u32 = 3;

/// One extracted span of monograph text with its location and category.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvidenceBlock {
    /// Section heading the span was found under.
    pub heading: String,

    /// 1-based page number in the source document, when the oracle cites one.
    #[serde(default)]
    pub page: Option<u32>,

    /// Coverage category (e.g., "dosage", "contraindications").
    pub category: String,

    /// Verbatim text of the span.
    pub text: String,

    /// Optional structured payload (tables, dose rows) the oracle attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

/// Structured, validated output of document extraction.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvidenceSet {
    /// Free-form document metadata (brand name, DIN, revision date, ...).
    #[serde(default)]
    pub meta: serde_json::Value,

    /// Ordered evidence blocks; deduplicated before persistence.
    #[serde(default)]
    pub blocks: Vec<EvidenceBlock>,

    /// Schema version of this shape.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    EVIDENCE_SCHEMA_VERSION
}

impl EvidenceSet {
    /// An empty set with current schema version.
    pub fn empty() -> Self {
        Self { meta: serde_json::Value::Null, blocks: Vec::new(), schema_version: EVIDENCE_SCHEMA_VERSION }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Deserialize from a recovered JSON object, tolerating a missing
    /// `schema_version` but rejecting anything that is not the block shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::Error> {
        serde_json::from_value(value).map_err(|e| crate::Error::OracleMalformed(format!("not an evidence set: {e}")))
    }
}
