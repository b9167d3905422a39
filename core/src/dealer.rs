//! Dealer fee configuration.
//!
//! Only the package referenced by `default_package_id` is ever priced.
//! Package selection beyond that default belongs to the caller.

use crate::{
    result::{FeeCategory, LineItem},
    types::{DealerId, FeeCode},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerFee {
    pub fee_code:    FeeCode,
    pub description: String,
    pub amount:      Decimal,
    #[serde(default = "default_dealer_category")]
    pub category:    FeeCategory,
}

fn default_dealer_category() -> FeeCategory {
    FeeCategory::Dealer
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerPackage {
    pub id:   String,
    pub name: String,
    #[serde(default)]
    pub fees: Vec<DealerFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerConfig {
    pub dealer_id:          DealerId,
    #[serde(default)]
    pub default_package_id: Option<String>,
    #[serde(default)]
    pub packages:           Vec<DealerPackage>,
}

impl DealerConfig {
    /// A dealer with no packages; prices government fees and tax only.
    pub fn empty(dealer_id: &str) -> Self {
        Self {
            dealer_id:          dealer_id.to_string(),
            default_package_id: None,
            packages:           Vec::new(),
        }
    }

    pub fn default_package(&self) -> Option<&DealerPackage> {
        let id = self.default_package_id.as_deref()?;
        self.packages.iter().find(|p| p.id == id)
    }
}

/// Line items for the default package, applied unconditionally, plus any
/// configuration notes.
pub fn default_package_items(config: &DealerConfig) -> (Vec<LineItem>, Vec<String>) {
    let mut notes = Vec::new();

    let package = match (&config.default_package_id, config.default_package()) {
        (_, Some(package)) => package,
        (None, None) => {
            notes.push(format!(
                "Dealer {} has no default fee package; no dealer fees applied",
                config.dealer_id
            ));
            log::warn!("dealer: {} has no default package", config.dealer_id);
            return (Vec::new(), notes);
        }
        (Some(id), None) => {
            notes.push(format!(
                "Dealer {} default package '{id}' not found; no dealer fees applied",
                config.dealer_id
            ));
            log::warn!("dealer: {} default package '{id}' missing", config.dealer_id);
            return (Vec::new(), notes);
        }
    };

    let items = package
        .fees
        .iter()
        .map(|fee| LineItem {
            fee_code:    fee.fee_code.clone(),
            description: fee.description.clone(),
            amount:      fee.amount,
            category:    fee.category,
            rule_id:     None,
        })
        .collect();

    (items, notes)
}
