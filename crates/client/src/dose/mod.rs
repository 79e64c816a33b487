//! Dose safety gate.
//!
//! A dose proposal is advisory; this module decides what actually leaves the
//! system. Three deterministic checks run over the proposal, the patient, and
//! the persisted evidence: input plausibility, cap derivation, and cap
//! enforcement. The gate only ever holds or lowers a proposal's status, never
//! raises it, and a BLOCK decision carries no dose.

pub mod cap;
pub mod plausibility;

pub use cap::{CapQuote, DerivedCap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Decision severity, ordered OK < WARN < BLOCK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseStatus {
    Ok,
    Warn,
    Block,
}

impl DoseStatus {
    fn rank(self) -> u8 {
        match self {
            DoseStatus::Ok => 0,
            DoseStatus::Warn => 1,
            DoseStatus::Block => 2,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: DoseStatus) -> DoseStatus {
        if other.rank() > self.rank() { other } else { self }
    }
}

/// Patient inputs for one dose request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    /// Age in years.
    pub age: Option<f64>,
    /// Weight in kilograms.
    pub weight: Option<f64>,
    pub gender: Option<String>,
}

/// Dosing history supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct DoseContext {
    /// Milligrams already taken in the current 24-hour window.
    pub last_dose_mg: Option<f64>,
    /// When the most recent dose was taken.
    pub last_dose_time: Option<DateTime<Utc>>,
}

/// The proposal as parsed from the oracle reply. Every field is optional;
/// the gate treats absence conservatively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoseCandidate {
    pub status: Option<DoseStatus>,
    pub suggested_dose_mg: Option<f64>,
    pub interval_hours: Option<f64>,
    pub cap_mg: Option<f64>,
    pub cap_quote: Option<CapQuote>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// The gated decision returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DoseDecision {
    pub status: DoseStatus,
    pub suggested_dose_mg: Option<f64>,
    pub interval_hours: Option<f64>,
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub cap_mg: Option<f64>,
    pub cap_provenance: Option<DerivedCap>,
    pub notes: Vec<String>,
}

impl DoseDecision {
    /// A BLOCK that carries no dose, only the explanation.
    pub fn blocked(notes: Vec<String>) -> Self {
        Self {
            status: DoseStatus::Block,
            suggested_dose_mg: None,
            interval_hours: None,
            next_eligible_at: None,
            cap_mg: None,
            cap_provenance: None,
            notes,
        }
    }
}

/// Apply the safety gate to one proposal.
///
/// Plausibility runs first and a hard stop there returns before any evidence
/// is consulted. Otherwise the effective cap is the smallest of the cap
/// derived from evidence and the proposal's own corroborated cap; an
/// uncorroborated cap claim is discarded with a warning. The final status is
/// the worst of the proposal's own status and every check.
pub fn gate(
    patient: &Patient, candidate: &DoseCandidate, context: &DoseContext,
    evidence: &pmdex_core::EvidenceSet,
) -> DoseDecision {
    let finding = plausibility::assess(patient.age, patient.weight);
    let mut notes = finding.notes;
    if finding.status == DoseStatus::Block {
        return DoseDecision::blocked(notes);
    }
    let mut status = finding.status;

    match candidate.status {
        Some(s) => status = status.worst(s),
        None => {
            status = status.worst(DoseStatus::Warn);
            notes.push("proposal did not state a status".to_string());
        }
    }
    notes.extend(candidate.notes.iter().cloned());

    let derived = cap::derive(evidence);
    let corroborated = candidate.cap_quote.as_ref().and_then(cap::corroborate);
    if candidate.cap_mg.is_some() && corroborated.is_none() {
        status = status.worst(DoseStatus::Warn);
        notes.push("cap claim had no corroborating quote and was discarded".to_string());
    }

    let effective = match (derived, corroborated) {
        (Some(a), Some(b)) => Some(if b.cap_mg < a.cap_mg { b } else { a }),
        (a, b) => a.or(b),
    };

    let mut suggested = candidate.suggested_dose_mg;
    let mut interval = candidate.interval_hours;
    let mut next_eligible_at = None;

    if let Some(cap) = &effective {
        if let Some(taken) = context.last_dose_mg {
            if taken >= cap.cap_mg {
                notes.push(format!(
                    "daily maximum of {} mg already reached ({} mg taken)",
                    cap.cap_mg, taken
                ));
                return DoseDecision {
                    status: DoseStatus::Block,
                    suggested_dose_mg: None,
                    interval_hours: None,
                    next_eligible_at: context.last_dose_time.map(|t| t + Duration::hours(24)),
                    cap_mg: Some(cap.cap_mg),
                    cap_provenance: effective.clone(),
                    notes,
                };
            }
        }

        let daily = match (suggested, interval) {
            (Some(dose), Some(hours)) if hours > 0.0 => Some(dose * (24.0 / hours)),
            (Some(dose), _) => Some(dose),
            _ => None,
        };
        if let Some(daily_mg) = daily {
            if daily_mg > cap.cap_mg {
                status = status.worst(DoseStatus::Warn);
                notes.push(format!(
                    "proposed regimen reaches {daily_mg} mg/day, above the documented maximum of {} mg",
                    cap.cap_mg
                ));
            }
        }
    }

    if status == DoseStatus::Block {
        suggested = None;
        interval = None;
    } else if let (Some(t), Some(hours)) = (context.last_dose_time, interval) {
        next_eligible_at = Some(t + Duration::seconds((hours * 3600.0) as i64));
    }

    DoseDecision {
        status,
        suggested_dose_mg: suggested,
        interval_hours: interval,
        next_eligible_at,
        cap_mg: effective.as_ref().map(|c| c.cap_mg),
        cap_provenance: effective,
        notes,
    }
}
