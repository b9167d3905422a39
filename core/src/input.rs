//! Per-request deal input.
//!
//! A `ScenarioInput` is built once per request and never mutated by the engine.

use crate::{
    error::{EngineError, EngineResult},
    money::{floor_zero, MAX_AMOUNT},
    scenario_detector::PlateScenario,
    types::StateCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeIn {
    pub estimated_value: Decimal,
    pub payoff_amount:   Decimal,
}

impl TradeIn {
    /// Positive equity only; an upside-down trade contributes nothing.
    pub fn equity(&self) -> Decimal {
        floor_zero(self.estimated_value - self.payoff_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jurisdiction {
    pub state_code:  StateCode,
    #[serde(default)]
    pub county_name: Option<String>,
}

impl Jurisdiction {
    /// `STATE/County`, with `*` standing in for a statewide lookup.
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.state_code,
            self.county_name.as_deref().unwrap_or("*")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInput {
    pub sale_price:                 Decimal,
    #[serde(default)]
    pub cash_down:                  Decimal,
    #[serde(default)]
    pub loan_term:                  i32,
    #[serde(default)]
    pub apr:                        Decimal,
    #[serde(default)]
    pub trade_ins:                  Vec<TradeIn>,
    pub jurisdiction:               Jurisdiction,
    #[serde(default)]
    pub is_first_time_registration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_scenario:             Option<PlateScenario>,
}

impl ScenarioInput {
    /// Reject inputs the engine cannot price. Fatal for the call.
    pub fn validate(&self) -> EngineResult<()> {
        check_amount("salePrice", self.sale_price)?;
        if self.loan_term < 0 {
            return Err(EngineError::invalid_input(
                "loanTerm",
                format!("must be >= 0, got {}", self.loan_term),
            ));
        }
        check_amount("cashDown", self.cash_down)?;
        check_amount("apr", self.apr)?;
        for (i, trade) in self.trade_ins.iter().enumerate() {
            check_amount(&format!("tradeIns[{i}].estimatedValue"), trade.estimated_value)?;
            check_amount(&format!("tradeIns[{i}].payoffAmount"), trade.payoff_amount)?;
        }
        if self.trade_in_equity() > MAX_AMOUNT {
            return Err(EngineError::invalid_input(
                "tradeIns",
                format!("combined equity must be <= {MAX_AMOUNT}"),
            ));
        }
        if self.jurisdiction.state_code.trim().is_empty() {
            return Err(EngineError::invalid_input(
                "jurisdiction.stateCode",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Sum of positive trade-in equity across all trade-ins.
    pub fn trade_in_equity(&self) -> Decimal {
        self.trade_ins
            .iter()
            .map(TradeIn::equity)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}

fn check_amount(field: &str, amount: Decimal) -> EngineResult<()> {
    if amount < Decimal::ZERO {
        return Err(EngineError::invalid_input(field, format!("must be >= 0, got {amount}")));
    }
    if amount > MAX_AMOUNT {
        return Err(EngineError::invalid_input(
            field,
            format!("must be <= {MAX_AMOUNT}, got {amount}"),
        ));
    }
    Ok(())
}
