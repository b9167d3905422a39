//! Typed jurisdiction rules.
//!
//! RULE: the engine only ever sees these typed shapes. Raw rule rows are
//! decoded in rule_decoder.rs before they reach any calculator.

use crate::{
    condition::Condition,
    input::Jurisdiction,
    types::{FeeCode, RuleId, StateCode},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    GovernmentFee,
    TaxRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernmentFeeRule {
    pub fee_code:          FeeCode,
    pub description:       String,
    pub amount:            Decimal,
    #[serde(default)]
    pub condition:         Condition,
    pub auto_apply:        bool,
    pub priority:          i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusivity_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateRule {
    pub state_rate:      Decimal,
    pub county_rate:     Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_cap_base: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ruleType", content = "data")]
pub enum RulePayload {
    GovernmentFee(GovernmentFeeRule),
    TaxRate(TaxRateRule),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionRule {
    pub id:              RuleId,
    pub state_code:      StateCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name:     Option<String>,
    pub effective_date:  NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    pub payload:         RulePayload,
}

impl JurisdictionRule {
    pub fn rule_type(&self) -> RuleType {
        match self.payload {
            RulePayload::GovernmentFee(_) => RuleType::GovernmentFee,
            RulePayload::TaxRate(_)       => RuleType::TaxRate,
        }
    }

    pub fn as_government_fee(&self) -> Option<&GovernmentFeeRule> {
        match &self.payload {
            RulePayload::GovernmentFee(fee) => Some(fee),
            RulePayload::TaxRate(_) => None,
        }
    }

    pub fn as_tax_rate(&self) -> Option<&TaxRateRule> {
        match &self.payload {
            RulePayload::TaxRate(rate) => Some(rate),
            RulePayload::GovernmentFee(_) => None,
        }
    }

    /// Same state, and either statewide or the deal's county.
    /// Codes and county names compare case-insensitively.
    pub fn applies_to(&self, jurisdiction: &Jurisdiction) -> bool {
        if !self.state_code.eq_ignore_ascii_case(&jurisdiction.state_code) {
            return false;
        }
        match (&self.county_name, &jurisdiction.county_name) {
            (None, _) => true,
            (Some(rule_county), Some(deal_county)) => {
                rule_county.trim().eq_ignore_ascii_case(deal_county.trim())
            }
            (Some(_), None) => false,
        }
    }

    /// `effective_date <= as_of < expiration_date` (open-ended when unset).
    pub fn is_effective(&self, as_of: NaiveDate) -> bool {
        self.effective_date <= as_of
            && self.expiration_date.map_or(true, |expires| as_of < expires)
    }

    pub fn is_statewide(&self) -> bool {
        self.county_name.is_none()
    }
}

/// Rules of one type that apply to the jurisdiction and are in force on `as_of`.
pub fn effective_rules<'r>(
    rules: &'r [JurisdictionRule],
    rule_type: RuleType,
    jurisdiction: &'r Jurisdiction,
    as_of: NaiveDate,
) -> impl Iterator<Item = &'r JurisdictionRule> + 'r {
    rules.iter().filter(move |rule| {
        rule.rule_type() == rule_type && rule.applies_to(jurisdiction) && rule.is_effective(as_of)
    })
}
