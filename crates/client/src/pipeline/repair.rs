//! Coverage-driven repair loop.
//!
//! One full extraction, then bounded repair: while gaps remain and fewer
//! than two repair calls have been made, the oracle is asked to fill exactly
//! the named gaps. The loop always terminates; a non-empty result with
//! residual gaps is accepted as best-effort.

use crate::oracle::ExtractionOracle;
use crate::recover::recover_json;
use pmdex_core::evidence::coverage::{CoverageRequirement, missing};
use pmdex_core::evidence::dedupe::dedupe;
use pmdex_core::{Error, EvidenceSet};

/// Hard bound on oracle repair calls per extraction.
pub const MAX_REPAIR_ATTEMPTS: usize = 2;

/// Runs extraction plus bounded repair against one document.
pub struct RepairLoop<'a, O: ExtractionOracle> {
    oracle: &'a O,
    requirements: &'static [CoverageRequirement],
}

impl<'a, O: ExtractionOracle> RepairLoop<'a, O> {
    pub fn new(oracle: &'a O, requirements: &'static [CoverageRequirement]) -> Self {
        Self { oracle, requirements }
    }

    /// Produce the best evidence set the budget allows.
    ///
    /// Errors only on unrecoverable oracle or parse failures; residual
    /// coverage gaps are logged and accepted.
    pub async fn run(&self, doc_ref: &str) -> Result<EvidenceSet, Error> {
        let raw = self.oracle.full_extraction(doc_ref).await.map_err(Error::from)?;
        let mut set = self.parse_evidence(raw).await?;
        set.blocks = dedupe(set.blocks);

        let mut attempts = 0;
        loop {
            let gaps = missing(&set, self.requirements);
            if gaps.is_empty() {
                break;
            }
            if attempts >= MAX_REPAIR_ATTEMPTS {
                tracing::warn!(
                    "accepting extraction of {} with {} residual coverage gap(s) after {} repair attempts",
                    doc_ref,
                    gaps.len(),
                    attempts
                );
                break;
            }
            attempts += 1;
            tracing::debug!("repair attempt {} for {}: {} gap(s)", attempts, doc_ref, gaps.len());

            let raw = self.oracle.repair(doc_ref, &set, &gaps).await.map_err(Error::from)?;
            let mut repaired = self.parse_evidence(raw).await?;
            repaired.blocks = dedupe(repaired.blocks);
            if repaired.meta.is_null() {
                repaired.meta = set.meta;
            }
            set = repaired;
        }

        Ok(set)
    }

    /// Recover and type one oracle reply.
    ///
    /// A mechanical-cleanup parse failure escalates once to the oracle's
    /// syntax-repair mode; only a second failure is fatal.
    async fn parse_evidence(&self, raw: String) -> Result<EvidenceSet, Error> {
        let value = match recover_json(&raw) {
            Ok(value) => value,
            Err(first_err) => {
                tracing::debug!("mechanical JSON recovery failed ({}), trying oracle syntax repair", first_err);
                let fixed = self.oracle.fix_syntax(&raw).await.map_err(Error::from)?;
                recover_json(&fixed).map_err(|_| first_err)?
            }
        };
        EvidenceSet::from_value(value)
    }
}
