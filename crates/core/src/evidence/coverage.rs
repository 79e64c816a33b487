//! Coverage validation for extracted evidence.
//!
//! The requirement table is fixed per schema version, not per document.
//! A gap is non-fatal: it drives the repair loop, never a pipeline failure.

use super::EvidenceSet;
use serde::{Deserialize, Serialize};

/// Minimum evidence expected for one category.
#[derive(Debug, Clone)]
pub struct CoverageRequirement {
    pub category: &'static str,
    pub min_count: usize,
    /// When set, at least one counted block's text must contain one of these
    /// keywords (case-insensitive).
    pub keyword_any: Option<&'static [&'static str]>,
}

/// A required category that is missing or under-represented.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CategoryGap {
    pub category: String,
    pub required: usize,
    pub found: usize,
    /// True when blocks exist but none satisfied the content predicate.
    pub predicate_unmet: bool,
}

/// Keywords marking monitoring evidence as lab/renal-aware.
const MONITORING_KEYWORDS: &[&str] = &["renal", "creatinine", "hepatic", "liver", "serum", "plasma", "monitor"];

/// Requirement table for the evidence-block schema.
pub fn default_requirements() -> &'static [CoverageRequirement] {
    const REQUIREMENTS: &[CoverageRequirement] = &[
        CoverageRequirement { category: "indications", min_count: 1, keyword_any: None },
        CoverageRequirement { category: "dosage", min_count: 2, keyword_any: None },
        CoverageRequirement { category: "contraindications", min_count: 1, keyword_any: None },
        CoverageRequirement { category: "warnings", min_count: 1, keyword_any: None },
        CoverageRequirement { category: "monitoring", min_count: 1, keyword_any: Some(MONITORING_KEYWORDS) },
    ];
    REQUIREMENTS
}

/// Report every requirement the set does not yet satisfy.
pub fn missing(set: &EvidenceSet, requirements: &[CoverageRequirement]) -> Vec<CategoryGap> {
    let mut gaps = Vec::new();

    for req in requirements {
        let matching: Vec<_> = set.blocks.iter().filter(|b| b.category == req.category).collect();
        let found = matching.len();

        let predicate_met = match req.keyword_any {
            None => true,
            Some(keywords) => matching.iter().any(|b| {
                let text = b.text.to_lowercase();
                keywords.iter().any(|k| text.contains(k))
            }),
        };

        if found < req.min_count || !predicate_met {
            gaps.push(CategoryGap {
                category: req.category.to_string(),
                required: req.min_count,
                found,
                predicate_unmet: found >= req.min_count && !predicate_met,
            });
        }
    }

    gaps
}
