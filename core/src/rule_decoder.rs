//! Adapter from loosely typed rule rows to typed `JurisdictionRule`s.
//!
//! Rows arrive the way the rule store exports them: snake_case columns, a
//! string `rule_type` discriminator and a free-form `rule_data` document.
//! Everything that can be wrong with a row is caught here so the engine
//! never handles raw JSON.

use crate::{
    condition::Condition,
    error::{EngineError, EngineResult},
    rule::{GovernmentFeeRule, JurisdictionRule, RulePayload, TaxRateRule},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FEE_PRIORITY: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRuleRow {
    pub id:              String,
    pub state_code:      String,
    #[serde(default)]
    pub county_name:     Option<String>,
    pub rule_type:       String,
    pub effective_date:  String,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub rule_data:       serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GovernmentFeeData {
    fee_code:          String,
    #[serde(default)]
    description:       Option<String>,
    amount:            Decimal,
    #[serde(default)]
    condition:         Option<serde_json::Value>,
    #[serde(default = "default_auto_apply")]
    auto_apply:        bool,
    #[serde(default = "default_priority")]
    priority:          i32,
    #[serde(default)]
    exclusivity_group: Option<String>,
}

fn default_auto_apply() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_FEE_PRIORITY
}

#[derive(Debug, Deserialize)]
struct TaxRateData {
    state_rate:      Decimal,
    #[serde(default)]
    county_rate:     Decimal,
    #[serde(default)]
    county_cap_base: Option<Decimal>,
}

pub fn decode_rule(row: &RawRuleRow) -> EngineResult<JurisdictionRule> {
    let fail = |reason: String| EngineError::RuleDecode {
        rule_id: row.id.clone(),
        reason,
    };

    if row.id.trim().is_empty() {
        return Err(fail("empty rule id".to_string()));
    }
    if row.state_code.trim().is_empty() {
        return Err(fail("empty state_code".to_string()));
    }

    let effective_date = parse_date(&row.effective_date).map_err(&fail)?;
    let expiration_date = match row.expiration_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_date(raw).map_err(&fail)?),
        _ => None,
    };
    if let Some(expires) = expiration_date {
        if expires <= effective_date {
            return Err(fail(format!(
                "expiration_date {expires} is not after effective_date {effective_date}"
            )));
        }
    }

    let payload = match normalize_rule_type(&row.rule_type).as_str() {
        "government_fee" => RulePayload::GovernmentFee(decode_fee(&row.rule_data).map_err(&fail)?),
        "tax_rate" => RulePayload::TaxRate(decode_tax_rate(&row.rule_data).map_err(&fail)?),
        other => return Err(fail(format!("unknown rule_type '{other}'"))),
    };

    let county_name = row
        .county_name
        .as_deref()
        .map(str::trim)
        .filter(|county| !county.is_empty())
        .map(str::to_string);

    Ok(JurisdictionRule {
        id: row.id.clone(),
        state_code: row.state_code.trim().to_ascii_uppercase(),
        county_name,
        effective_date,
        expiration_date,
        payload,
    })
}

/// Decode every row; the first bad row fails the batch.
pub fn decode_rules(rows: &[RawRuleRow]) -> EngineResult<Vec<JurisdictionRule>> {
    rows.iter().map(decode_rule).collect()
}

/// Decode what can be decoded; bad rows are logged and dropped.
pub fn decode_rules_lenient(rows: &[RawRuleRow]) -> Vec<JurisdictionRule> {
    rows.iter()
        .filter_map(|row| match decode_rule(row) {
            Ok(rule) => Some(rule),
            Err(e) => {
                log::warn!("decode: dropping rule row: {e}");
                None
            }
        })
        .collect()
}

fn normalize_rule_type(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains(['_', '-', ' ']) || !raw.chars().any(|c| c.is_ascii_lowercase()) {
        return raw.to_ascii_lowercase().replace(['-', ' '], "_");
    }

    // CamelCase -> snake_case
    let mut out = String::with_capacity(raw.len() + 4);
    for (i, ch) in raw.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `YYYY-MM-DD`, or a timestamp whose first ten characters are one.
fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("bad date '{raw}': {e}"))
}

fn decode_fee(data: &serde_json::Value) -> Result<GovernmentFeeRule, String> {
    let fee: GovernmentFeeData =
        serde_json::from_value(data.clone()).map_err(|e| format!("government fee data: {e}"))?;

    if fee.fee_code.trim().is_empty() {
        return Err("empty fee_code".to_string());
    }
    if fee.amount < Decimal::ZERO {
        return Err(format!("negative amount {}", fee.amount));
    }

    let condition = match fee.condition {
        None | Some(serde_json::Value::Null) => Condition::always(),
        Some(raw) => Condition::try_from(raw).map_err(|e| format!("condition: {e}"))?,
    };

    let description = fee
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| fee.fee_code.clone());

    Ok(GovernmentFeeRule {
        fee_code: fee.fee_code,
        description,
        amount: fee.amount,
        condition,
        auto_apply: fee.auto_apply,
        priority: fee.priority,
        exclusivity_group: fee.exclusivity_group.filter(|g| !g.trim().is_empty()),
    })
}

fn decode_tax_rate(data: &serde_json::Value) -> Result<TaxRateRule, String> {
    let rates: TaxRateData =
        serde_json::from_value(data.clone()).map_err(|e| format!("tax rate data: {e}"))?;

    for (name, rate) in [("state_rate", rates.state_rate), ("county_rate", rates.county_rate)] {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(format!("{name} {rate} must be a fraction between 0 and 1"));
        }
    }
    if let Some(cap) = rates.county_cap_base {
        if cap < Decimal::ZERO {
            return Err(format!("negative county_cap_base {cap}"));
        }
    }

    Ok(TaxRateRule {
        state_rate: rates.state_rate,
        county_rate: rates.county_rate,
        county_cap_base: rates.county_cap_base,
    })
}
