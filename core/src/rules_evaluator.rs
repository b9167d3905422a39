//! Rules evaluator: picks the government fees a deal owes.
//!
//! Selection order (fixed):
//!   1. Location and effective-date filter
//!   2. Condition evaluation; optional (non auto-apply) rules never selected
//!   3. Exclusivity groups resolved to a single winner
//!   4. Sort by priority, then fee code
//!
//! RULE: nothing here fails. Missing or broken rule data only produces
//! explanations; the caller always gets a usable fee list.

use crate::{
    condition::{evaluate, EvaluationContext},
    input::ScenarioInput,
    result::{FeeCategory, LineItem},
    rule::{GovernmentFeeRule, JurisdictionRule, RuleType},
    scenario_detector::Scenario,
    types::RuleId,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Output of fee selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeSelection {
    pub line_items:       Vec<LineItem>,
    pub explanations:     Vec<String>,
    pub applied_rule_ids: Vec<RuleId>,
}

#[derive(Clone, Copy)]
struct Candidate<'r> {
    rule: &'r JurisdictionRule,
    fee:  &'r GovernmentFeeRule,
}

impl Candidate<'_> {
    /// Winner first: highest priority, then lowest fee code, then rule id.
    fn precedence(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.fee.priority
            .cmp(&a.fee.priority)
            .then_with(|| a.fee.fee_code.cmp(&b.fee.fee_code))
            .then_with(|| a.rule.id.cmp(&b.rule.id))
    }

    /// Output order: lowest priority first, then fee code, then rule id.
    fn output_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.fee.priority
            .cmp(&b.fee.priority)
            .then_with(|| a.fee.fee_code.cmp(&b.fee.fee_code))
            .then_with(|| a.rule.id.cmp(&b.rule.id))
    }
}

pub fn find_applicable_fees(
    rules: &[JurisdictionRule],
    input: &ScenarioInput,
    scenario: &Scenario,
    as_of: NaiveDate,
) -> FeeSelection {
    let jurisdiction = &input.jurisdiction;
    let mut selection = FeeSelection::default();

    let configured: Vec<&JurisdictionRule> = rules
        .iter()
        .filter(|rule| rule.rule_type() == RuleType::GovernmentFee && rule.applies_to(jurisdiction))
        .collect();

    if configured.is_empty() {
        let note = format!("No jurisdiction rules configured for {}", jurisdiction.label());
        log::warn!("rules: {note}");
        selection.explanations.push(note);
        return selection;
    }

    let ctx = EvaluationContext::new(input, scenario);
    let mut matched: Vec<Candidate<'_>> = Vec::new();
    let mut unmatched_grouped: Vec<Candidate<'_>> = Vec::new();
    let mut in_force = 0usize;

    for rule in configured.into_iter().filter(|rule| rule.is_effective(as_of)) {
        let Some(fee) = rule.as_government_fee() else {
            continue;
        };
        in_force += 1;

        if let Some(op) = fee.condition.unsupported_operator() {
            let note = format!(
                "rule {} skipped: unsupported operator '{op}' in condition",
                rule.id
            );
            log::warn!("rules: {note}");
            selection.explanations.push(note);
            continue;
        }

        if !fee.auto_apply {
            log::debug!("rules: {} ({}) is optional, not auto-applied", fee.fee_code, rule.id);
            continue;
        }

        let candidate = Candidate { rule, fee };
        if evaluate(&fee.condition, &ctx) {
            matched.push(candidate);
        } else {
            log::debug!("rules: {} ({}) condition not met", fee.fee_code, rule.id);
            if fee.exclusivity_group.is_some() {
                unmatched_grouped.push(candidate);
            }
        }
    }

    if in_force == 0 {
        let note = format!(
            "No government fee rules in effect for {} on {as_of}",
            jurisdiction.label()
        );
        log::warn!("rules: {note}");
        selection.explanations.push(note);
        return selection;
    }

    unmatched_grouped.sort_by(Candidate::precedence);

    let mut selected: Vec<Candidate<'_>> = Vec::new();
    let mut groups: BTreeMap<&str, Vec<Candidate<'_>>> = BTreeMap::new();
    for candidate in matched {
        match candidate.fee.exclusivity_group.as_deref() {
            Some(group) => groups.entry(group).or_default().push(candidate),
            None => selected.push(candidate),
        }
    }

    for (group, mut members) in groups {
        members.sort_by(Candidate::precedence);
        let winner = members[0];
        let winner_code = &winner.fee.fee_code;

        for loser in &members[1..] {
            let note = format!(
                "{} not applied: superseded by {winner_code}",
                loser.fee.fee_code
            );
            log::debug!("rules: group {group}: {note}");
            selection.explanations.push(note);
        }

        // Members whose own condition failed are reported against the winner
        // so the audit trail names every alternative in the group.
        for other in unmatched_grouped
            .iter()
            .filter(|c| c.fee.exclusivity_group.as_deref() == Some(group))
        {
            if other.fee.fee_code != *winner_code {
                selection.explanations.push(format!(
                    "{} not applied: superseded by {winner_code}",
                    other.fee.fee_code
                ));
            }
        }

        selected.push(winner);
    }

    selected.sort_by(Candidate::output_order);

    for candidate in selected {
        selection.applied_rule_ids.push(candidate.rule.id.clone());
        selection.line_items.push(LineItem {
            fee_code:    candidate.fee.fee_code.clone(),
            description: candidate.fee.description.clone(),
            amount:      candidate.fee.amount,
            category:    FeeCategory::Government,
            rule_id:     Some(candidate.rule.id.clone()),
        });
    }

    log::debug!(
        "rules: {} government fee(s) selected for {}",
        selection.line_items.len(),
        jurisdiction.label()
    );

    selection
}
