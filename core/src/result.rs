//! Calculation output.
//!
//! A `ScenarioResult` is built fresh per call and serialises deterministically;
//! the audit log compares results as serialised JSON.

use crate::{
    error::{EngineError, EngineResult},
    money::checked_sum,
    scenario_detector::Scenario,
    tax_calculator::TaxBreakdown,
    types::{FeeCode, RuleId},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    Government,
    Dealer,
    Customer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub fee_code:    FeeCode,
    pub description: String,
    pub amount:      Decimal,
    pub category:    FeeCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id:     Option<RuleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub government_fees: Decimal,
    pub dealer_fees:     Decimal,
    pub customer_addons: Decimal,
    pub sales_tax:       Decimal,
    pub total_fees:      Decimal,
}

impl Totals {
    /// Category sums. Fee amounts come from configuration and are not
    /// bounded on input, so an overflowing sum is rejected.
    pub fn from_items(items: &[LineItem], sales_tax: Decimal) -> EngineResult<Self> {
        let sum = |category: FeeCategory| -> EngineResult<Decimal> {
            checked_sum(
                items
                    .iter()
                    .filter(|item| item.category == category)
                    .map(|item| item.amount),
            )
            .ok_or_else(|| overflow(category_field(category)))
        };

        let government_fees = sum(FeeCategory::Government)?;
        let dealer_fees = sum(FeeCategory::Dealer)?;
        let customer_addons = sum(FeeCategory::Customer)?;
        let total_fees = checked_sum([government_fees, dealer_fees, customer_addons])
            .ok_or_else(|| overflow("totalFees"))?;

        Ok(Self {
            government_fees,
            dealer_fees,
            customer_addons,
            sales_tax,
            total_fees,
        })
    }
}

fn category_field(category: FeeCategory) -> &'static str {
    match category {
        FeeCategory::Government => "governmentFees",
        FeeCategory::Dealer => "dealerFees",
        FeeCategory::Customer => "customerAddons",
    }
}

fn overflow(field: &str) -> EngineError {
    EngineError::invalid_input(field, "sum exceeds the representable amount")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub as_of:            NaiveDate,
    pub scenario:         Scenario,
    pub line_items:       Vec<LineItem>,
    pub totals:           Totals,
    pub tax_breakdown:    TaxBreakdown,
    pub explanations:     Vec<String>,
    pub applied_rule_ids: Vec<RuleId>,
}

impl ScenarioResult {
    pub fn items_in(&self, category: FeeCategory) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(move |item| item.category == category)
    }

    pub fn line_item(&self, fee_code: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.fee_code == fee_code)
    }
}
