//! Loan-term normalisation.
//!
//! Lender rate sheets are keyed on a handful of standard terms. Any term the
//! customer asks for is snapped to the nearest one before a rate is looked up.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

pub const STANDARD_TERMS: [i32; 5] = [36, 48, 60, 72, 84];

/// Nearest standard term; equidistant terms resolve to the shorter one.
/// A zero term (cash deal) maps to the shortest standard term.
pub fn normalize_term_to_standard(term: i32) -> EngineResult<i32> {
    if term < 0 {
        return Err(EngineError::invalid_input(
            "loanTerm",
            format!("must be >= 0, got {term}"),
        ));
    }
    if term == 0 {
        return Ok(STANDARD_TERMS[0]);
    }

    // min_by_key keeps the first minimum, and STANDARD_TERMS is ascending.
    let nearest = STANDARD_TERMS
        .iter()
        .copied()
        .min_by_key(|standard| (standard - term).abs())
        .unwrap_or(STANDARD_TERMS[0]);
    Ok(nearest)
}

pub fn normalize_term_range(min_term: i32, max_term: i32) -> EngineResult<(i32, i32)> {
    if min_term > max_term {
        return Err(EngineError::invalid_input(
            "termRange",
            format!("min {min_term} is greater than max {max_term}"),
        ));
    }
    Ok((
        normalize_term_to_standard(min_term)?,
        normalize_term_to_standard(max_term)?,
    ))
}

pub fn is_standard_term(term: i32) -> bool {
    STANDARD_TERMS.contains(&term)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermNormalization {
    pub original:     i32,
    pub normalized:   i32,
    pub distance:     i32,
    pub was_modified: bool,
}

pub fn term_normalization_info(term: i32) -> EngineResult<TermNormalization> {
    let normalized = normalize_term_to_standard(term)?;
    Ok(TermNormalization {
        original: term,
        normalized,
        distance: (normalized - term).abs(),
        was_modified: normalized != term,
    })
}

/// Terms as quoted on a rate sheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RateTerms {
    Exact { term: i32 },
    Range { min: i32, max: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRateTerms {
    pub term_range_min: i32,
    pub term_range_max: i32,
    pub term_label:     String,
}

pub fn normalize_rate_terms(terms: RateTerms) -> EngineResult<NormalizedRateTerms> {
    let (min, max) = match terms {
        RateTerms::Exact { term } => {
            let term = normalize_term_to_standard(term)?;
            (term, term)
        }
        RateTerms::Range { min, max } => normalize_term_range(min, max)?,
    };

    let term_label = if min == max {
        format!("{min} Months")
    } else {
        format!("{min}-{max} Months")
    };

    Ok(NormalizedRateTerms {
        term_range_min: min,
        term_range_max: max,
        term_label,
    })
}
