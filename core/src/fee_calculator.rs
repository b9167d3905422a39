//! Fee calculator: the single entry point of the engine.
//!
//! EXECUTION ORDER (fixed):
//!   0. Input validation        (only fatal step)
//!   1. Scenario detection
//!   2. Government fee selection
//!   3. Sales tax
//!   4. Dealer default package
//!   5. Totals, applied rule ids, explanations
//!
//! RULES:
//!   - No I/O, no clock reads, no hidden state. `as_of` is an argument.
//!   - Same arguments, same serialised result, byte for byte.
//!   - Rules and dealer config are borrowed and never mutated.

use crate::{
    dealer::{default_package_items, DealerConfig},
    error::EngineResult,
    input::ScenarioInput,
    result::{ScenarioResult, Totals},
    rule::JurisdictionRule,
    rules_evaluator::find_applicable_fees,
    scenario_detector::detect,
    tax_calculator,
};
use chrono::NaiveDate;

pub fn calculate(
    input: &ScenarioInput,
    rules: &[JurisdictionRule],
    dealer_config: &DealerConfig,
    as_of: NaiveDate,
) -> EngineResult<ScenarioResult> {
    input.validate()?;

    let scenario = detect(input);
    let fees = find_applicable_fees(rules, input, &scenario, as_of);
    let tax = tax_calculator::calculate(input, &scenario, rules, as_of);
    let (dealer_items, dealer_notes) = default_package_items(dealer_config);

    let mut line_items = fees.line_items;
    line_items.extend(dealer_items);

    let totals = Totals::from_items(&line_items, tax.breakdown.total_tax)?;

    let mut applied_rule_ids = fees.applied_rule_ids;
    applied_rule_ids.extend(tax.rule_id);

    let mut explanations = fees.explanations;
    explanations.extend(tax.explanations);
    explanations.extend(dealer_notes);

    log::info!(
        "calc: {} as of {as_of}: gov={} dealer={} addons={} tax={} fees={} ({} note(s))",
        input.jurisdiction.label(),
        totals.government_fees,
        totals.dealer_fees,
        totals.customer_addons,
        totals.sales_tax,
        totals.total_fees,
        explanations.len()
    );

    Ok(ScenarioResult {
        as_of,
        scenario,
        line_items,
        totals,
        tax_breakdown: tax.breakdown,
        explanations,
        applied_rule_ids,
    })
}
