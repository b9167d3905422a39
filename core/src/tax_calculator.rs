//! Sales tax with trade-in credit and a capped county base.
//!
//! RULE: bases stay exact; only `state_tax` and `county_tax` are rounded.

use crate::{
    input::ScenarioInput,
    money::{floor_zero, format_usd, round2},
    rule::{effective_rules, JurisdictionRule, RuleType, TaxRateRule},
    scenario_detector::Scenario,
    types::RuleId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub trade_in_equity:     Decimal,
    pub taxable_base:        Decimal,
    pub state_rate:          Decimal,
    pub county_rate:         Decimal,
    pub county_taxable_base: Decimal,
    pub state_tax:           Decimal,
    pub county_tax:          Decimal,
    pub county_tax_capped:   bool,
    pub total_tax:           Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxOutcome {
    pub breakdown:    TaxBreakdown,
    pub explanations: Vec<String>,
    /// The tax-rate rule used, if one was found.
    pub rule_id:      Option<RuleId>,
}

pub fn calculate(
    input: &ScenarioInput,
    _scenario: &Scenario,
    rules: &[JurisdictionRule],
    as_of: NaiveDate,
) -> TaxOutcome {
    let trade_in_equity = input.trade_in_equity();
    let taxable_base = floor_zero(input.sale_price - trade_in_equity);
    let mut explanations = Vec::new();

    let Some((rule, rates)) = resolve_rate_rule(rules, input, as_of, &mut explanations) else {
        let note = format!(
            "tax rates unavailable for {}",
            input.jurisdiction.label()
        );
        log::warn!("tax: {note}");
        explanations.push(note);
        return TaxOutcome {
            breakdown: TaxBreakdown {
                trade_in_equity,
                taxable_base,
                county_taxable_base: taxable_base,
                ..TaxBreakdown::default()
            },
            explanations,
            rule_id: None,
        };
    };

    let breakdown = apply_rates(trade_in_equity, taxable_base, rates);

    if breakdown.county_tax_capped {
        if let Some(cap) = rates.county_cap_base {
            explanations.push(format!(
                "County tax capped: base limited to {} of {} taxable",
                format_usd(cap),
                format_usd(taxable_base)
            ));
        }
    }

    log::debug!(
        "tax: base={} state={} county={} capped={} (rule {})",
        breakdown.taxable_base,
        breakdown.state_tax,
        breakdown.county_tax,
        breakdown.county_tax_capped,
        rule.id
    );

    TaxOutcome {
        breakdown,
        explanations,
        rule_id: Some(rule.id.clone()),
    }
}

/// Pure rate application, exposed for callers that already hold a rate.
pub fn apply_rates(
    trade_in_equity: Decimal,
    taxable_base: Decimal,
    rates: &TaxRateRule,
) -> TaxBreakdown {
    let county_taxable_base = match rates.county_cap_base {
        Some(cap) => taxable_base.min(cap),
        None => taxable_base,
    };
    let county_tax_capped = rates
        .county_cap_base
        .map_or(false, |cap| taxable_base > cap);

    let state_tax = round2(taxable_base * rates.state_rate);
    let county_tax = round2(county_taxable_base * rates.county_rate);

    TaxBreakdown {
        trade_in_equity,
        taxable_base,
        state_rate: rates.state_rate,
        county_rate: rates.county_rate,
        county_taxable_base,
        state_tax,
        county_tax,
        county_tax_capped,
        total_tax: state_tax + county_tax,
    }
}

/// Pick one rate rule: county beats statewide, then newest effective date,
/// then lowest id. Two candidates at the same scope are a configuration gap.
fn resolve_rate_rule<'r>(
    rules: &'r [JurisdictionRule],
    input: &'r ScenarioInput,
    as_of: NaiveDate,
    explanations: &mut Vec<String>,
) -> Option<(&'r JurisdictionRule, &'r TaxRateRule)> {
    let mut candidates: Vec<(&JurisdictionRule, &TaxRateRule)> =
        effective_rules(rules, RuleType::TaxRate, &input.jurisdiction, as_of)
            .filter_map(|rule| rule.as_tax_rate().map(|rates| (rule, rates)))
            .collect();

    candidates.sort_by(|(a, _), (b, _)| {
        a.is_statewide()
            .cmp(&b.is_statewide())
            .then_with(|| b.effective_date.cmp(&a.effective_date))
            .then_with(|| a.id.cmp(&b.id))
    });

    let chosen = candidates.first().copied()?;
    let rivals: Vec<&str> = candidates[1..]
        .iter()
        .filter(|(r, _)| r.is_statewide() == chosen.0.is_statewide())
        .map(|(r, _)| r.id.as_str())
        .collect();
    if !rivals.is_empty() {
        let note = format!(
            "Multiple tax rate rules for {}; using {} over {}",
            input.jurisdiction.label(),
            chosen.0.id,
            rivals.join(", ")
        );
        log::warn!("tax: {note}");
        explanations.push(note);
    }
    Some(chosen)
}
