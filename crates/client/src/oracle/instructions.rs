//! Instruction builders for the oracle's three call modes.
//!
//! The contract with the oracle is text-in/JSON-out. Extraction and repair
//! both describe the evidence-block shape; repair additionally names the
//! exact coverage gaps and forbids fabrication. Syntax repair is told to fix
//! only syntax and add no information.

use pmdex_core::EvidenceSet;
use pmdex_core::evidence::coverage::CategoryGap;

const EVIDENCE_SHAPE: &str = r#"Respond with a single JSON object:
{
  "meta": { "brand_name": "...", "din": "...", "revision_date": "..." },
  "blocks": [
    { "heading": "<section heading>", "page": <1-based page or null>,
      "category": "indications|dosage|contraindications|warnings|monitoring|other",
      "text": "<verbatim excerpt>" }
  ]
}
Quote text verbatim from the document. Cite the page wherever possible.
Do not include anything outside the JSON object."#;

/// Instructions for a full extraction pass over one document.
pub fn extraction(doc_ref: &str) -> (String, String) {
    let system = format!(
        "You extract dosing evidence from official drug product monographs. \
         You only report content that is present in the document. {EVIDENCE_SHAPE}"
    );
    let user = format!(
        "Read the product monograph at {doc_ref} and extract every passage \
         relevant to indications, dosage and administration, contraindications, \
         warnings, and patient monitoring."
    );
    (system, user)
}

/// Instructions for a repair pass over a prior, incomplete extraction.
///
/// Prior correct entries must be preserved; only newly found content may be
/// added, and nothing may be fabricated.
pub fn repair(doc_ref: &str, current: &EvidenceSet, gaps: &[CategoryGap]) -> (String, String) {
    let system = format!(
        "You repair incomplete extractions of drug product monographs. \
         Keep every existing block unchanged, add only blocks for content that \
         is actually present in the document, and never fabricate. {EVIDENCE_SHAPE}"
    );

    let gap_lines: Vec<String> = gaps
        .iter()
        .map(|g| {
            if g.predicate_unmet {
                format!(
                    "- {}: {} block(s) found but none mention laboratory or renal monitoring",
                    g.category, g.found
                )
            } else {
                format!("- {}: need at least {}, found {}", g.category, g.required, g.found)
            }
        })
        .collect();

    let current_json = serde_json::to_string(current).unwrap_or_else(|_| "{}".into());
    let user = format!(
        "Document: {doc_ref}\n\nCurrent extraction:\n{current_json}\n\n\
         Missing coverage:\n{}\n\nReturn the full updated JSON object.",
        gap_lines.join("\n")
    );
    (system, user)
}

/// Instructions to repair broken JSON syntax without adding information.
pub fn syntax_repair(raw: &str) -> (String, String) {
    let system = "The following text is meant to be a single JSON object but does not parse. \
                  Fix only the syntax. Add no information, remove no information, change no values. \
                  Respond with the corrected JSON object only."
        .to_string();
    (system, raw.to_string())
}

/// Instructions for a one-shot dose proposal over persisted evidence.
pub fn dose_proposal(key: &str, patient_json: &str, evidence: &EvidenceSet) -> (String, String) {
    let system = r#"You propose a dose for one patient from official monograph evidence.
Respond with a single JSON object:
{
  "status": "OK|WARN|BLOCK",
  "suggested_dose_mg": <number or null>,
  "interval_hours": <number or null>,
  "cap_mg": <maximum daily dose in mg, or null>,
  "cap_quote": { "text": "<verbatim excerpt stating the cap>", "page": <page> },
  "notes": ["<short rationale>"]
}
Only assert a cap_mg when you can quote the exact supporting excerpt with its page.
Do not include anything outside the JSON object."#
        .to_string();

    let evidence_json = serde_json::to_string(evidence).unwrap_or_else(|_| "{}".into());
    let user = format!("Drug key: {key}\nPatient: {patient_json}\nEvidence:\n{evidence_json}");
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmdex_core::evidence::EvidenceBlock;

    fn sample_set() -> EvidenceSet {
        EvidenceSet {
            meta: serde_json::Value::Null,
            blocks: vec![EvidenceBlock {
                heading: "DOSAGE".into(),
                page: Some(3),
                category: "dosage".into(),
                text: "500 mg every 6 hours".into(),
                structured: None,
            }],
            schema_version: pmdex_core::evidence::EVIDENCE_SCHEMA_VERSION,
        }
    }

    #[test]
    fn test_extraction_names_document() {
        let (_, user) = extraction("https://example.org/pm/1.PDF");
        assert!(user.contains("https://example.org/pm/1.PDF"));
    }

    #[test]
    fn test_repair_names_exact_gaps() {
        let gaps = vec![
            CategoryGap { category: "warnings".into(), required: 1, found: 0, predicate_unmet: false },
            CategoryGap { category: "monitoring".into(), required: 1, found: 1, predicate_unmet: true },
        ];
        let (system, user) = repair("doc", &sample_set(), &gaps);

        assert!(system.contains("never fabricate"));
        assert!(user.contains("warnings: need at least 1, found 0"));
        assert!(user.contains("monitoring: 1 block(s) found"));
        assert!(user.contains("500 mg every 6 hours"));
    }

    #[test]
    fn test_syntax_repair_forbids_additions() {
        let (system, user) = syntax_repair("{broken");
        assert!(system.contains("Add no information"));
        assert_eq!(user, "{broken");
    }

    #[test]
    fn test_dose_proposal_includes_patient_and_evidence() {
        let (_, user) = dose_proposal("02247521", r#"{"age": 25}"#, &sample_set());
        assert!(user.contains("02247521"));
        assert!(user.contains("\"age\": 25"));
        assert!(user.contains("500 mg"));
    }
}
