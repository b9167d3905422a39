//! Calculation audit: record a quote with its snapshots, replay it later.
//!
//! A replay decodes the stored input, rules and dealer config, recomputes
//! with the stored `as_of`, and compares the serialised result with the
//! recorded one. Any difference is a determinism bug.

use crate::{
    dealer::DealerConfig,
    error::{EngineError, EngineResult},
    fee_calculator::calculate,
    input::ScenarioInput,
    result::ScenarioResult,
    rule::JurisdictionRule,
    store::{AuditRecord, AuditStore},
    types::AuditId,
};
use chrono::NaiveDate;
use uuid::Uuid;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calculate and persist the calculation with everything needed to replay it.
pub fn record_calculation(
    store: &AuditStore,
    input: &ScenarioInput,
    rules: &[JurisdictionRule],
    dealer_config: &DealerConfig,
    as_of: NaiveDate,
) -> EngineResult<(AuditId, ScenarioResult)> {
    let result = calculate(input, rules, dealer_config, as_of)?;
    let audit_id = Uuid::new_v4().to_string();

    let record = AuditRecord {
        audit_id:       audit_id.clone(),
        as_of:          as_of.format(DATE_FORMAT).to_string(),
        jurisdiction:   input.jurisdiction.label(),
        dealer_id:      dealer_config.dealer_id.clone(),
        engine_version: ENGINE_VERSION.to_string(),
        input_json:     serde_json::to_string(input)?,
        rules_json:     serde_json::to_string(rules)?,
        dealer_json:    serde_json::to_string(dealer_config)?,
        result_json:    serde_json::to_string(&result)?,
    };
    store.insert(&record)?;

    log::info!(
        "audit: recorded {audit_id} for {} ({} rule(s) in snapshot)",
        record.jurisdiction,
        rules.len()
    );
    Ok((audit_id, result))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub audit_id:       AuditId,
    pub matches:        bool,
    pub engine_version: String,
    pub recorded_json:  String,
    pub replayed_json:  String,
}

/// Recompute a recorded calculation and compare it byte for byte.
pub fn replay(store: &AuditStore, audit_id: &str) -> EngineResult<ReplayOutcome> {
    let record = store
        .get(audit_id)?
        .ok_or_else(|| EngineError::NotFound(format!("audit record {audit_id}")))?;

    let input: ScenarioInput = serde_json::from_str(&record.input_json)?;
    let rules: Vec<JurisdictionRule> = serde_json::from_str(&record.rules_json)?;
    let dealer_config: DealerConfig = serde_json::from_str(&record.dealer_json)?;
    let as_of = NaiveDate::parse_from_str(&record.as_of, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("audit record {audit_id} has bad as_of '{}': {e}", record.as_of))?;

    let replayed = calculate(&input, &rules, &dealer_config, as_of)?;
    let replayed_json = serde_json::to_string(&replayed)?;
    let matches = replayed_json == record.result_json;

    if matches {
        log::debug!("audit: replay of {audit_id} reproduced the recorded result");
    } else {
        log::warn!(
            "audit: replay of {audit_id} diverged (recorded with engine {}, replayed with {ENGINE_VERSION})",
            record.engine_version
        );
    }

    Ok(ReplayOutcome {
        audit_id: record.audit_id,
        matches,
        engine_version: record.engine_version,
        recorded_json: record.result_json,
        replayed_json,
    })
}
