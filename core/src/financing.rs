//! Financing summary derived from a finished calculation.
//!
//! The payment is an estimate for the quote sheet; lender pricing is out of
//! scope. Amortises over the term the customer asked for, and reports the
//! standard term a rate sheet would be keyed on alongside it.

use crate::{
    error::{EngineError, EngineResult},
    input::ScenarioInput,
    loan_terms::normalize_term_to_standard,
    money::{checked_sum, floor_zero, round2},
    result::ScenarioResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingSummary {
    pub amount_financed: Decimal,
    pub normalized_term: Option<i32>,
    pub monthly_payment: Option<Decimal>,
}

pub fn summarize(input: &ScenarioInput, result: &ScenarioResult) -> EngineResult<FinancingSummary> {
    let gross = checked_sum([input.sale_price, result.totals.total_fees, result.totals.sales_tax])
        .ok_or_else(|| {
            EngineError::invalid_input("amountFinanced", "sum exceeds the representable amount")
        })?;
    let amount_financed = round2(floor_zero(
        gross.saturating_sub(input.cash_down).saturating_sub(input.trade_in_equity()),
    ));

    if !result.scenario.is_financed {
        return Ok(FinancingSummary {
            amount_financed,
            normalized_term: None,
            monthly_payment: None,
        });
    }

    let normalized_term = normalize_term_to_standard(input.loan_term)?;
    let monthly_payment = monthly_payment(amount_financed, input.apr, input.loan_term);

    log::debug!(
        "financing: {amount_financed} over {} month(s) at {}% -> {:?} (rate sheet term {normalized_term})",
        input.loan_term,
        input.apr,
        monthly_payment
    );

    Ok(FinancingSummary {
        amount_financed,
        normalized_term: Some(normalized_term),
        monthly_payment,
    })
}

/// Level payment for `principal` over `months` at `apr` percent.
/// None when there is no term to amortise over.
pub fn monthly_payment(principal: Decimal, apr: Decimal, months: i32) -> Option<Decimal> {
    if months <= 0 {
        return None;
    }
    let n = Decimal::from(months);
    if apr.is_zero() {
        return Some(round2(principal / n));
    }

    let r = apr / Decimal::ONE_HUNDRED / Decimal::from(12);
    let growth = checked_pow(Decimal::ONE + r, months.unsigned_abs())?;
    // P·r / (1 − (1+r)^−n) == P·r·g / (g − 1) with g = (1+r)^n
    if growth <= Decimal::ONE {
        return Some(round2(principal / n));
    }
    let payment = principal
        .checked_mul(r)?
        .checked_mul(growth)?
        .checked_div(growth - Decimal::ONE)?;
    Some(round2(payment))
}

/// `base^exp` by repeated squaring; None on overflow.
fn checked_pow(base: Decimal, mut exp: u32) -> Option<Decimal> {
    let mut result = Decimal::ONE;
    let mut square = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.checked_mul(square)?;
        }
        exp >>= 1;
        if exp > 0 {
            square = square.checked_mul(square)?;
        }
    }
    Some(result)
}
