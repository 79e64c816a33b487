//! Deterministic plausibility checks on patient inputs.
//!
//! Values outside global bounds and impossible age/weight combinations are
//! hard stops. Borderline combinations and missing inputs are warnings.

use super::DoseStatus;

/// Global age bounds in years.
pub const AGE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=120.0;
/// Global weight bounds in kg.
pub const WEIGHT_RANGE: std::ops::RangeInclusive<f64> = 0.5..=400.0;

/// Result of the plausibility gate.
#[derive(Debug, Clone)]
pub struct PlausibilityFinding {
    pub status: DoseStatus,
    pub notes: Vec<String>,
}

/// Assess patient age/weight plausibility.
pub fn assess(age_years: Option<f64>, weight_kg: Option<f64>) -> PlausibilityFinding {
    let mut status = DoseStatus::Ok;
    let mut notes = Vec::new();

    match age_years {
        None => {
            status = status.worst(DoseStatus::Warn);
            notes.push("age not provided".to_string());
        }
        Some(age) if !AGE_RANGE.contains(&age) || age.is_nan() => {
            status = DoseStatus::Block;
            notes.push(format!("age {age} outside plausible range 0-120"));
        }
        Some(_) => {}
    }

    match weight_kg {
        None => {
            status = status.worst(DoseStatus::Warn);
            notes.push("weight not provided".to_string());
        }
        Some(weight) if !WEIGHT_RANGE.contains(&weight) || weight.is_nan() => {
            status = DoseStatus::Block;
            notes.push(format!("weight {weight} kg outside plausible range 0.5-400"));
        }
        Some(_) => {}
    }

    if status == DoseStatus::Block {
        return PlausibilityFinding { status, notes };
    }

    if let (Some(age), Some(weight)) = (age_years, weight_kg) {
        if age < 2.0 && weight > 25.0 {
            status = DoseStatus::Block;
            notes.push(format!("implausible combination: age {age} with weight {weight} kg"));
        } else if age < 12.0 && weight > 100.0 {
            status = status.worst(DoseStatus::Warn);
            notes.push(format!("unusual combination: age {age} with weight {weight} kg"));
        } else if age >= 18.0 && weight < 35.0 {
            status = status.worst(DoseStatus::Warn);
            notes.push(format!("unusually low weight {weight} kg for adult age {age}"));
        }
    }

    PlausibilityFinding { status, notes }
}
