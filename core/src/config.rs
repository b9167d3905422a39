use crate::{
    dealer::DealerConfig,
    error::{EngineError, EngineResult},
    input::Jurisdiction,
    provider::{DealerConfigProvider, RuleProvider, DEFAULT_DEALER_TTL, DEFAULT_RULE_TTL},
    rule::JurisdictionRule,
    rule_decoder::{decode_rules, decode_rules_lenient, RawRuleRow},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct RuleFile {
    rules: Vec<RawRuleRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct DealerFile {
    dealers: Vec<DealerConfig>,
}

// ── Engine settings ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_rule_ttl_secs")]
    pub rule_cache_ttl_secs:   u64,
    #[serde(default = "default_dealer_ttl_secs")]
    pub dealer_cache_ttl_secs: u64,
    #[serde(default)]
    pub default_dealer_id:     Option<String>,
}

fn default_rule_ttl_secs() -> u64 {
    DEFAULT_RULE_TTL.as_secs()
}

fn default_dealer_ttl_secs() -> u64 {
    DEFAULT_DEALER_TTL.as_secs()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rule_cache_ttl_secs:   default_rule_ttl_secs(),
            dealer_cache_ttl_secs: default_dealer_ttl_secs(),
            default_dealer_id:     None,
        }
    }
}

impl EngineSettings {
    /// Load `engine/engine_settings.json`; a missing file means defaults.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine/engine_settings.json");
        if !Path::new(&path).exists() {
            log::debug!("config: {path} not found, using default engine settings");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let settings: EngineSettings = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(settings)
    }

    pub fn rule_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rule_cache_ttl_secs)
    }

    pub fn dealer_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dealer_cache_ttl_secs)
    }
}

// ── Rule catalog ───────────────────────────────────────────────────

/// Rules and dealer configs loaded from a data directory. Acts as the
/// backing provider for both lookups.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    pub rules:   Vec<JurisdictionRule>,
    pub dealers: HashMap<String, DealerConfig>,
}

impl RuleCatalog {
    /// Load from the data/ directory.
    /// In tests, use RuleCatalog::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let rules_path = format!("{data_dir}/rules/jurisdiction_rules.json");
        let rules_content = std::fs::read_to_string(&rules_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {rules_path}: {e}"))?;
        let rule_file: RuleFile = serde_json::from_str(&rules_content)?;
        let rules = decode_rules(&rule_file.rules)
            .map_err(|e| anyhow::anyhow!("{rules_path}: {e}"))?;

        let dealer_path = format!("{data_dir}/dealers/dealer_configs.json");
        let dealer_content = std::fs::read_to_string(&dealer_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {dealer_path}: {e}"))?;
        let dealer_file: DealerFile = serde_json::from_str(&dealer_content)?;
        let dealers = dealer_file
            .dealers
            .into_iter()
            .map(|d| (d.dealer_id.clone(), d))
            .collect();

        let catalog = Self { rules, dealers };
        log::info!(
            "config: loaded {} rule(s), {} dealer(s) from {data_dir}",
            catalog.rules.len(),
            catalog.dealers.len()
        );
        Ok(catalog)
    }

    /// Catalog with hardcoded Florida fixtures for use in tests.
    pub fn default_test() -> Self {
        let rows: Vec<RawRuleRow> = serde_json::from_value(json!([
            {
                "id": "fl-title-transfer", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "TITLE_TRANSFER", "description": "Title transfer fee",
                    "amount": "75.25", "priority": 100, "exclusivity_group": "TITLE",
                    "condition": {">": [{"var": "tradeIns.length"}, 0]}
                }
            },
            {
                "id": "fl-title-new", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "TITLE_NEW", "description": "New title fee",
                    "amount": "77.25", "priority": 90, "exclusivity_group": "TITLE",
                    "condition": {"==": [{"var": "tradeIns.length"}, 0]}
                }
            },
            {
                "id": "fl-plate-transfer", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "PLATE_TRANSFER", "description": "Plate transfer fee",
                    "amount": "4.60", "priority": 110, "exclusivity_group": "PLATE",
                    "condition": {"==": [{"var": "plateScenario"}, "TransferExistingPlate"]}
                }
            },
            {
                "id": "fl-plate-new", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "PLATE_NEW", "description": "New metal plate",
                    "amount": "28.00", "priority": 110, "exclusivity_group": "PLATE",
                    "condition": {"==": [{"var": "plateScenario"}, "NewPlate"]}
                }
            },
            {
                "id": "fl-initial-registration", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "INITIAL_REGISTRATION", "description": "Initial registration fee",
                    "amount": "225.00", "priority": 50,
                    "condition": {"var": "isFirstTimeRegistration"}
                }
            },
            {
                "id": "fl-lien-filing", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "LIEN_FILING", "description": "Lien recording fee",
                    "amount": "2.00", "priority": 120,
                    "condition": {"==": [{"var": "isFinanced"}, true]}
                }
            },
            {
                "id": "fl-specialty-plate", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "SPECIALTY_PLATE", "description": "Specialty plate (optional)",
                    "amount": "25.00", "priority": 130, "auto_apply": false
                }
            },
            {
                "id": "fl-title-legacy", "state_code": "FL", "rule_type": "government_fee",
                "effective_date": "2019-01-01", "expiration_date": "2024-01-01",
                "rule_data": {
                    "fee_code": "TITLE_LEGACY", "description": "Pre-2024 title fee",
                    "amount": "70.00", "priority": 100
                }
            },
            {
                "id": "fl-tax", "state_code": "FL", "rule_type": "tax_rate",
                "effective_date": "2024-01-01",
                "rule_data": { "state_rate": "0.06", "county_rate": "0.0" }
            },
            {
                "id": "fl-brevard-tax", "state_code": "FL", "county_name": "Brevard",
                "rule_type": "tax_rate", "effective_date": "2024-01-01",
                "rule_data": { "state_rate": "0.06", "county_rate": "0.01", "county_cap_base": "5000" }
            }
        ]))
        .unwrap_or_default();

        let rules = decode_rules_lenient(&rows);

        let dealers: Vec<DealerConfig> = serde_json::from_value(json!([
            {
                "dealerId": "demo-dealer",
                "defaultPackageId": "standard",
                "packages": [
                    {
                        "id": "standard", "name": "Standard",
                        "fees": [
                            { "feeCode": "DEALER_DOC", "description": "Dealer documentation fee",
                              "amount": "899.00", "category": "dealer" },
                            { "feeCode": "ELECTRONIC_FILING", "description": "Electronic filing fee",
                              "amount": "199.00", "category": "dealer" },
                            { "feeCode": "NITROGEN_TIRES", "description": "Nitrogen-filled tires",
                              "amount": "149.00", "category": "customer" }
                        ]
                    },
                    {
                        "id": "minimal", "name": "Minimal",
                        "fees": [
                            { "feeCode": "DEALER_DOC", "description": "Dealer documentation fee",
                              "amount": "499.00" }
                        ]
                    }
                ]
            },
            { "dealerId": "no-package-dealer", "packages": [] }
        ]))
        .unwrap_or_default();

        Self {
            rules,
            dealers: dealers
                .into_iter()
                .map(|d| (d.dealer_id.clone(), d))
                .collect(),
        }
    }
}

impl RuleProvider for RuleCatalog {
    fn rules_for(
        &self,
        state_code: &str,
        county_name: Option<&str>,
    ) -> EngineResult<Arc<Vec<JurisdictionRule>>> {
        let jurisdiction = Jurisdiction {
            state_code:  state_code.to_string(),
            county_name: county_name.map(str::to_string),
        };
        let matching = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(&jurisdiction))
            .cloned()
            .collect();
        Ok(Arc::new(matching))
    }
}

impl DealerConfigProvider for RuleCatalog {
    fn dealer_config(&self, dealer_id: &str) -> EngineResult<Arc<DealerConfig>> {
        self.dealers
            .get(dealer_id)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| EngineError::NotFound(format!("dealer {dealer_id}")))
    }
}
