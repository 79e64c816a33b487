//! Evidence block deduplication.
//!
//! Repair passes re-run the oracle over the same document, so near-duplicate
//! blocks are expected. Dedupe runs after every oracle call (initial and each
//! repair) with order-preserving first-occurrence semantics.

use super::EvidenceBlock;
use std::collections::HashSet;

/// Length of the lowercased text prefix included in the fingerprint.
const TEXT_PREFIX_CHARS: usize = 80;

/// Content fingerprint for duplicate detection:
/// `category + page + lowercase(heading) + lowercase(text)[:80]`.
pub fn block_fingerprint(block: &EvidenceBlock) -> String {
    let text_prefix: String = block.text.to_lowercase().chars().take(TEXT_PREFIX_CHARS).collect();
    format!(
        "{}|{}|{}|{}",
        block.category,
        block.page.map(|p| p.to_string()).unwrap_or_default(),
        block.heading.to_lowercase(),
        text_prefix
    )
}

/// Remove duplicate blocks, keeping the first occurrence of each fingerprint.
pub fn dedupe(blocks: Vec<EvidenceBlock>) -> Vec<EvidenceBlock> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter(|block| seen.insert(block_fingerprint(block)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(category: &str, page: Option<u32>, heading: &str, text: &str) -> EvidenceBlock {
        EvidenceBlock {
            heading: heading.to_string(),
            page,
            category: category.to_string(),
            text: text.to_string(),
            structured: None,
        }
    }

    #[test]
    fn test_dedupe_removes_case_variant_heading() {
        let blocks = vec![
            block("dosage", Some(3), "DOSAGE AND ADMINISTRATION", "Adults: 500 mg twice daily."),
            block("dosage", Some(3), "Dosage and Administration", "Adults: 500 mg twice daily."),
        ];

        let deduped = dedupe(blocks);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].heading, "DOSAGE AND ADMINISTRATION");
    }

    #[test]
    fn test_dedupe_keeps_distinct_pages() {
        let blocks = vec![
            block("warnings", Some(4), "WARNINGS", "Hepatotoxicity risk."),
            block("warnings", Some(9), "WARNINGS", "Hepatotoxicity risk."),
        ];

        assert_eq!(dedupe(blocks).len(), 2);
    }

    #[test]
    fn test_dedupe_uses_text_prefix_only() {
        let long_a = format!("{} tail one", "x".repeat(90));
        let long_b = format!("{} tail two", "x".repeat(90));
        let blocks = vec![
            block("dosage", None, "DOSAGE", &long_a),
            block("dosage", None, "DOSAGE", &long_b),
        ];

        // Divergence past the 80-char prefix does not make blocks distinct.
        assert_eq!(dedupe(blocks).len(), 1);
    }

    #[test]
    fn test_dedupe_preserves_order() {
        let blocks = vec![
            block("indications", Some(1), "INDICATIONS", "Pain relief."),
            block("dosage", Some(3), "DOSAGE", "500 mg."),
            block("indications", Some(1), "INDICATIONS", "Pain relief."),
            block("warnings", Some(4), "WARNINGS", "Do not exceed."),
        ];

        let deduped = dedupe(blocks);
        let categories: Vec<&str> = deduped.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(categories, vec!["indications", "dosage", "warnings"]);
    }
}
