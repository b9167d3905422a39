//! Scenario detector: classifies a deal into the flags rules are keyed on.
//!
//! RULE: detection is total and O(1). It never infers registration history;
//! `is_first_time_registration` is whatever the caller said it is.

use crate::input::ScenarioInput;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateScenario {
    NewPlate,
    TransferExistingPlate,
}

impl PlateScenario {
    pub fn as_str(self) -> &'static str {
        match self {
            PlateScenario::NewPlate              => "NewPlate",
            PlateScenario::TransferExistingPlate => "TransferExistingPlate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub has_trade_in:               bool,
    pub is_financed:                bool,
    pub plate_scenario:             PlateScenario,
    pub is_first_time_registration: bool,
    pub description:                String,
}

pub fn detect(input: &ScenarioInput) -> Scenario {
    let has_trade_in = !input.trade_ins.is_empty();
    let is_financed = input.loan_term > 0;

    // A trade-in is assumed to free up a plate that can be transferred.
    let plate_scenario = input.plate_scenario.unwrap_or(if has_trade_in {
        PlateScenario::TransferExistingPlate
    } else {
        PlateScenario::NewPlate
    });

    let description = describe(
        has_trade_in,
        is_financed,
        plate_scenario,
        input.is_first_time_registration,
    );

    log::debug!("scenario: {description}");

    Scenario {
        has_trade_in,
        is_financed,
        plate_scenario,
        is_first_time_registration: input.is_first_time_registration,
        description,
    }
}

fn describe(
    has_trade_in: bool,
    is_financed: bool,
    plate: PlateScenario,
    first_time: bool,
) -> String {
    let tag = match plate {
        PlateScenario::TransferExistingPlate => "Tag transfer",
        PlateScenario::NewPlate              => "New tag",
    };
    let payment = if is_financed { "financed" } else { "cash" };

    let mut description = format!("{tag} purchase, {payment}");
    if has_trade_in {
        description.push_str(", with trade-in");
    }
    if first_time {
        description.push_str(", first-time registration");
    }
    description
}
