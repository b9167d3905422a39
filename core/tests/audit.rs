use chrono::NaiveDate;
use dealdesk_core::{
    audit::{record_calculation, replay},
    config::RuleCatalog,
    input::{Jurisdiction, ScenarioInput, TradeIn},
    store::AuditStore,
    EngineError,
};
use rust_decimal_macros::dec;

// ── Test helpers ──────────────────────────────────────────────────

fn store() -> AuditStore {
    let store = AuditStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn deal() -> ScenarioInput {
    ScenarioInput {
        sale_price:                 dec!(25000),
        cash_down:                  dec!(1000),
        loan_term:                  66,
        apr:                        dec!(4.9),
        trade_ins:                  vec![TradeIn {
            estimated_value: dec!(8000),
            payoff_amount:   dec!(5000),
        }],
        jurisdiction:               Jurisdiction {
            state_code:  "FL".into(),
            county_name: Some("Brevard".into()),
        },
        is_first_time_registration: false,
        plate_scenario:             None,
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────

/// A recorded calculation replays to the same bytes.
#[test]
fn recorded_calculation_replays_identically() {
    let store = store();
    let catalog = RuleCatalog::default_test();
    let dealer = catalog.dealers["demo-dealer"].clone();

    let (audit_id, result) =
        record_calculation(&store, &deal(), &catalog.rules, &dealer, as_of()).unwrap();
    assert_eq!(result.totals.sales_tax, dec!(1370.00));

    let outcome = replay(&store, &audit_id).unwrap();
    assert!(outcome.matches, "replay diverged:\n  {}\n  {}", outcome.recorded_json, outcome.replayed_json);
    assert_eq!(outcome.recorded_json, serde_json::to_string(&result).unwrap());
}

/// Replay uses the stored snapshot, not whatever rules exist today.
#[test]
fn replay_is_independent_of_later_rule_changes() {
    let store = store();
    let mut catalog = RuleCatalog::default_test();
    let dealer = catalog.dealers["demo-dealer"].clone();

    let (audit_id, _) =
        record_calculation(&store, &deal(), &catalog.rules, &dealer, as_of()).unwrap();

    catalog.rules.clear();
    assert!(replay(&store, &audit_id).unwrap().matches);
}

/// Records are stored with their jurisdiction label and can be listed.
#[test]
fn records_are_listed_by_jurisdiction() {
    let store = store();
    let catalog = RuleCatalog::default_test();
    let dealer = catalog.dealers["demo-dealer"].clone();

    let (first, _) = record_calculation(&store, &deal(), &catalog.rules, &dealer, as_of()).unwrap();
    let (second, _) = record_calculation(&store, &deal(), &catalog.rules, &dealer, as_of()).unwrap();
    assert_ne!(first, second);

    assert_eq!(store.count().unwrap(), 2);
    let recent = store.recent_for_jurisdiction("FL/Brevard", 10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].audit_id, second);
    assert_eq!(recent[0].dealer_id, "demo-dealer");
    assert_eq!(recent[0].as_of, "2025-06-01");
    assert!(store.recent_for_jurisdiction("FL/*", 10).unwrap().is_empty());
}

/// A tampered result no longer matches on replay.
#[test]
fn altered_result_is_detected() {
    let store = store();
    let catalog = RuleCatalog::default_test();
    let dealer = catalog.dealers["demo-dealer"].clone();

    let (audit_id, _) =
        record_calculation(&store, &deal(), &catalog.rules, &dealer, as_of()).unwrap();
    let mut record = store.get(&audit_id).unwrap().expect("stored record");
    record.audit_id = "tampered".into();
    record.result_json = record.result_json.replace("1370.00", "1369.00");
    store.insert(&record).unwrap();

    let outcome = replay(&store, "tampered").unwrap();
    assert!(!outcome.matches);
}

/// Unknown audit ids are a NotFound error.
#[test]
fn unknown_audit_id_is_not_found() {
    let store = store();
    assert!(matches!(
        replay(&store, "no-such-id"),
        Err(EngineError::NotFound(_))
    ));
    assert!(store.get("no-such-id").unwrap().is_none());
}
