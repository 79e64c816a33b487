//! Maximum-daily-dose derivation from persisted evidence.
//!
//! Caps are found by a deterministic text scan, never trusted from the
//! proposal alone. A sentence yields a cap candidate when it carries both a
//! dose amount (mg or g) and a daily-limit token; the smallest candidate
//! across the evidence wins.

use pmdex_core::EvidenceSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Dose amount with unit, e.g. "2 g", "500mg", "37.5 mg".
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(mg|g)\b").unwrap_or_else(|e| panic!("amount regex: {e}"))
});

/// Phrases marking a per-day limit.
const DAILY_TOKENS: &[&str] = &[
    "per day",
    "a day",
    "daily",
    "/day",
    "per 24 hours",
    "in 24 hours",
    "in a 24-hour",
    "every 24 hours",
];

/// Evidence categories scanned for caps.
const CAP_CATEGORIES: &[&str] = &["dosage", "warnings"];

/// A cap with the excerpt and page that back it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedCap {
    /// Maximum daily dose in milligrams.
    pub cap_mg: f64,
    /// 1-based page of the supporting excerpt, when cited.
    pub page: Option<u32>,
    /// The sentence the cap was read from.
    pub excerpt: String,
}

/// Quote offered by the proposal to back its own cap claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapQuote {
    pub text: String,
    pub page: Option<u32>,
}

fn has_daily_token(segment_lower: &str) -> bool {
    DAILY_TOKENS.iter().any(|t| segment_lower.contains(t))
}

/// Smallest dose amount in a segment, converted to mg. Grams scale by 1000.
fn smallest_amount_mg(segment: &str) -> Option<f64> {
    let mut best: Option<f64> = None;
    for caps in AMOUNT_RE.captures_iter(segment) {
        let number: f64 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let mg = if caps[2].eq_ignore_ascii_case("g") { number * 1000.0 } else { number };
        best = Some(match best {
            Some(b) if b <= mg => b,
            _ => mg,
        });
    }
    best
}

/// Scan dosage and warnings evidence for a maximum daily dose.
///
/// Returns the smallest corroborated cap, or `None` when no sentence states
/// one.
pub fn derive(evidence: &EvidenceSet) -> Option<DerivedCap> {
    let mut best: Option<DerivedCap> = None;

    for block in &evidence.blocks {
        if !CAP_CATEGORIES.contains(&block.category.as_str()) {
            continue;
        }
        for segment in block.text.split(['.', ';', '\n']) {
            let lower = segment.to_lowercase();
            if !has_daily_token(&lower) {
                continue;
            }
            let Some(mg) = smallest_amount_mg(segment) else { continue };
            if best.as_ref().is_none_or(|b| mg < b.cap_mg) {
                best = Some(DerivedCap { cap_mg: mg, page: block.page, excerpt: segment.trim().to_string() });
            }
        }
    }

    best
}

/// Validate a proposal's cap quote.
///
/// The quote must cite a page and its text must itself contain a dose amount
/// and a daily-limit token; the amount read from the quote is returned, not
/// the number the proposal asserted.
pub fn corroborate(quote: &CapQuote) -> Option<DerivedCap> {
    let page = quote.page?;
    let lower = quote.text.to_lowercase();
    if !has_daily_token(&lower) {
        return None;
    }
    let mg = smallest_amount_mg(&quote.text)?;
    Some(DerivedCap { cap_mg: mg, page: Some(page), excerpt: quote.text.trim().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmdex_core::evidence::{EVIDENCE_SCHEMA_VERSION, EvidenceBlock};

    fn set_with(category: &str, page: Option<u32>, text: &str) -> EvidenceSet {
        EvidenceSet {
            meta: serde_json::Value::Null,
            blocks: vec![EvidenceBlock {
                heading: "DOSAGE".into(),
                page,
                category: category.into(),
                text: text.into(),
                structured: None,
            }],
            schema_version: EVIDENCE_SCHEMA_VERSION,
        }
    }

    #[test]
    fn test_derives_gram_cap_in_mg() {
        let set = set_with("dosage", Some(4), "The total dose should not exceed 2 g per day.");
        let cap = derive(&set).unwrap();
        assert_eq!(cap.cap_mg, 2000.0);
        assert_eq!(cap.page, Some(4));
        assert!(cap.excerpt.contains("2 g per day"));
    }

    #[test]
    fn test_amount_without_daily_token_is_not_a_cap() {
        let set = set_with("dosage", Some(3), "Adults: 500 mg every 6 hours as needed.");
        assert!(derive(&set).is_none());
    }

    #[test]
    fn test_smallest_cap_wins() {
        let mut set = set_with("dosage", Some(3), "Do not exceed 4000 mg daily.");
        set.blocks.push(EvidenceBlock {
            heading: "WARNINGS".into(),
            page: Some(6),
            category: "warnings".into(),
            text: "In hepatic impairment the maximum is 2000 mg per day.".into(),
            structured: None,
        });
        assert_eq!(derive(&set).unwrap().cap_mg, 2000.0);
    }

    #[test]
    fn test_non_dosing_categories_are_ignored() {
        let set = set_with("indications", Some(1), "Studied at 4000 mg per day in trials.");
        assert!(derive(&set).is_none());
    }

    #[test]
    fn test_corroborate_requires_page_and_daily_token() {
        let good = CapQuote { text: "Maximum 3.2 g daily in divided doses.".into(), page: Some(5) };
        assert_eq!(corroborate(&good).unwrap().cap_mg, 3200.0);

        let no_page = CapQuote { text: "Maximum 3.2 g daily.".into(), page: None };
        assert!(corroborate(&no_page).is_none());

        let no_token = CapQuote { text: "Doses of 3.2 g were studied.".into(), page: Some(5) };
        assert!(corroborate(&no_token).is_none());

        let no_amount = CapQuote { text: "Do not exceed the daily limit.".into(), page: Some(5) };
        assert!(corroborate(&no_amount).is_none());
    }

    #[test]
    fn test_segment_scan_does_not_cross_sentences() {
        // The amount and the daily token live in different sentences.
        let set = set_with("dosage", Some(2), "Take 500 mg per dose. Review the daily schedule with a physician.");
        assert!(derive(&set).is_none());
    }
}
