use chrono::NaiveDate;
use dealdesk_core::{
    calculate,
    config::RuleCatalog,
    dealer::{DealerConfig, DealerFee, DealerPackage},
    input::{Jurisdiction, ScenarioInput, TradeIn},
    money::MAX_AMOUNT,
    EngineError, FeeCategory,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Test helpers ──────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Financed Florida deal with a positive-equity trade-in.
fn financed_deal() -> ScenarioInput {
    ScenarioInput {
        sale_price:                 dec!(20000),
        cash_down:                  dec!(2000),
        loan_term:                  60,
        apr:                        dec!(5.99),
        trade_ins:                  vec![TradeIn {
            estimated_value: dec!(5000),
            payoff_amount:   dec!(2000),
        }],
        jurisdiction:               Jurisdiction {
            state_code:  "FL".into(),
            county_name: None,
        },
        is_first_time_registration: false,
        plate_scenario:             None,
    }
}

fn dealer(catalog: &RuleCatalog, id: &str) -> DealerConfig {
    catalog.dealers.get(id).cloned().expect("fixture dealer")
}

/// A dealer whose default package carries the given dealer-category fees.
fn dealer_with_fees(amounts: &[Decimal]) -> DealerConfig {
    DealerConfig {
        dealer_id:          "big-dealer".into(),
        default_package_id: Some("std".into()),
        packages:           vec![DealerPackage {
            id:   "std".into(),
            name: "Standard".into(),
            fees: amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| DealerFee {
                    fee_code:    format!("FEE_{i}"),
                    description: format!("Fee {i}"),
                    amount:      *amount,
                    category:    FeeCategory::Dealer,
                })
                .collect(),
        }],
    }
}

fn invalid_field(result: Result<impl std::fmt::Debug, EngineError>) -> String {
    match result {
        Err(EngineError::InvalidInput { field, .. }) => field,
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────

/// Government fees, dealer package and tax all land in the result.
#[test]
fn full_quote_totals_by_category() {
    init_logging();
    let catalog = RuleCatalog::default_test();
    let result = calculate(
        &financed_deal(),
        &catalog.rules,
        &dealer(&catalog, "demo-dealer"),
        as_of(),
    )
    .unwrap();

    let codes: Vec<&str> = result.line_items.iter().map(|i| i.fee_code.as_str()).collect();
    assert_eq!(
        codes,
        vec![
            "TITLE_TRANSFER",
            "PLATE_TRANSFER",
            "LIEN_FILING",
            "DEALER_DOC",
            "ELECTRONIC_FILING",
            "NITROGEN_TIRES",
        ]
    );

    assert_eq!(result.totals.government_fees, dec!(81.85));
    assert_eq!(result.totals.dealer_fees, dec!(1098.00));
    assert_eq!(result.totals.customer_addons, dec!(149.00));
    assert_eq!(result.totals.total_fees, dec!(1328.85));
    assert_eq!(result.totals.sales_tax, dec!(1020.00));
    assert_eq!(result.tax_breakdown.taxable_base, dec!(17000));

    assert_eq!(
        result.applied_rule_ids,
        vec!["fl-title-transfer", "fl-plate-transfer", "fl-lien-filing", "fl-tax"]
    );
    assert_eq!(result.as_of, as_of());
    assert_eq!(result.items_in(FeeCategory::Customer).count(), 1);
    assert!(result.line_item("DEALER_DOC").unwrap().rule_id.is_none());
}

/// Explanations come in a fixed order: fees, then tax, then dealer.
#[test]
fn explanations_follow_fee_tax_dealer_order() {
    init_logging();
    let catalog = RuleCatalog::default_test();
    let mut input = financed_deal();
    input.jurisdiction.county_name = Some("Brevard".into());

    let result = calculate(
        &input,
        &catalog.rules,
        &dealer(&catalog, "no-package-dealer"),
        as_of(),
    )
    .unwrap();

    assert_eq!(
        result.explanations,
        vec![
            "PLATE_NEW not applied: superseded by PLATE_TRANSFER".to_string(),
            "TITLE_NEW not applied: superseded by TITLE_TRANSFER".to_string(),
            "County tax capped: base limited to $5,000.00 of $17,000.00 taxable".to_string(),
            "Dealer no-package-dealer has no default fee package; no dealer fees applied"
                .to_string(),
        ]
    );
    assert_eq!(result.totals.dealer_fees, dec!(0));
    assert_eq!(
        result.applied_rule_ids.last().map(String::as_str),
        Some("fl-brevard-tax")
    );
}

/// A default package id that matches nothing is a note, not an error.
#[test]
fn unknown_default_package_is_explained() {
    let catalog = RuleCatalog::default_test();
    let mut config = dealer(&catalog, "demo-dealer");
    config.default_package_id = Some("platinum".into());

    let result = calculate(&financed_deal(), &catalog.rules, &config, as_of()).unwrap();

    assert_eq!(result.items_in(FeeCategory::Dealer).count(), 0);
    assert!(result.explanations.contains(
        &"Dealer demo-dealer default package 'platinum' not found; no dealer fees applied"
            .to_string()
    ));
}

/// Switching the default package changes only the dealer lines.
#[test]
fn minimal_package_is_priced_when_default() {
    let catalog = RuleCatalog::default_test();
    let mut config = dealer(&catalog, "demo-dealer");
    config.default_package_id = Some("minimal".into());

    let result = calculate(&financed_deal(), &catalog.rules, &config, as_of()).unwrap();

    assert_eq!(result.totals.dealer_fees, dec!(499.00));
    assert_eq!(result.totals.customer_addons, dec!(0));
    assert_eq!(result.totals.government_fees, dec!(81.85));
}

/// Negative money fails before anything is priced.
#[test]
fn invalid_input_is_rejected() {
    let catalog = RuleCatalog::default_test();
    let config = dealer(&catalog, "demo-dealer");

    let mut input = financed_deal();
    input.sale_price = dec!(-1);
    match calculate(&input, &catalog.rules, &config, as_of()) {
        Err(EngineError::InvalidInput { field, .. }) => assert_eq!(field, "salePrice"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }

    let mut input = financed_deal();
    input.loan_term = -12;
    assert!(matches!(
        calculate(&input, &catalog.rules, &config, as_of()),
        Err(EngineError::InvalidInput { .. })
    ));

    let mut input = financed_deal();
    input.trade_ins[0].payoff_amount = dec!(-5);
    assert!(matches!(
        calculate(&input, &catalog.rules, &config, as_of()),
        Err(EngineError::InvalidInput { .. })
    ));
}

/// A jurisdiction with nothing configured still returns dealer fees.
#[test]
fn unconfigured_state_still_prices_dealer_fees() {
    let catalog = RuleCatalog::default_test();
    let mut input = financed_deal();
    input.jurisdiction = Jurisdiction {
        state_code:  "TX".into(),
        county_name: None,
    };

    let result = calculate(&input, &catalog.rules, &dealer(&catalog, "demo-dealer"), as_of())
        .unwrap();

    assert_eq!(result.totals.government_fees, dec!(0));
    assert_eq!(result.totals.sales_tax, dec!(0));
    assert_eq!(result.totals.total_fees, dec!(1247.00));
    assert!(result.applied_rule_ids.is_empty());
    assert_eq!(
        result.explanations,
        vec![
            "No jurisdiction rules configured for TX/*".to_string(),
            "tax rates unavailable for TX/*".to_string(),
        ]
    );
}

/// Trade-ins whose combined equity exceeds the decimal range are rejected
/// as input errors instead of overflowing the equity sum.
#[test]
fn oversized_trade_ins_are_rejected() {
    init_logging();
    let catalog = RuleCatalog::default_test();
    let config = dealer(&catalog, "demo-dealer");

    let huge = Decimal::MAX / Decimal::TWO + Decimal::ONE;
    let mut input = financed_deal();
    input.trade_ins = vec![
        TradeIn { estimated_value: huge, payoff_amount: dec!(0) },
        TradeIn { estimated_value: huge, payoff_amount: dec!(0) },
    ];

    let field = invalid_field(calculate(&input, &catalog.rules, &config, as_of()));
    assert_eq!(field, "tradeIns[0].estimatedValue");
}

/// Input amounts are accepted up to MAX_AMOUNT and rejected above it.
#[test]
fn amounts_above_the_ceiling_are_rejected() {
    let catalog = RuleCatalog::default_test();
    let config = dealer(&catalog, "demo-dealer");

    let mut input = financed_deal();
    input.sale_price = MAX_AMOUNT;
    assert!(calculate(&input, &catalog.rules, &config, as_of()).is_ok());

    input.sale_price = MAX_AMOUNT + dec!(0.01);
    assert_eq!(invalid_field(calculate(&input, &catalog.rules, &config, as_of())), "salePrice");

    let mut input = financed_deal();
    input.cash_down = Decimal::MAX;
    assert_eq!(invalid_field(calculate(&input, &catalog.rules, &config, as_of())), "cashDown");
}

/// Many trade-ins each under the ceiling still cannot push equity past it.
#[test]
fn combined_trade_in_equity_is_bounded() {
    let catalog = RuleCatalog::default_test();
    let config = dealer(&catalog, "demo-dealer");

    let mut input = financed_deal();
    input.trade_ins = vec![
        TradeIn { estimated_value: MAX_AMOUNT, payoff_amount: dec!(0) },
        TradeIn { estimated_value: MAX_AMOUNT, payoff_amount: dec!(0) },
    ];
    assert_eq!(invalid_field(calculate(&input, &catalog.rules, &config, as_of())), "tradeIns");
}

/// Configured fee amounts that overflow when totalled are reported,
/// not a panic in the totals step.
#[test]
fn overflowing_dealer_fees_are_an_error() {
    init_logging();
    let catalog = RuleCatalog::default_test();
    let config = dealer_with_fees(&[Decimal::MAX, Decimal::MAX]);

    let field = invalid_field(calculate(&financed_deal(), &catalog.rules, &config, as_of()));
    assert_eq!(field, "dealerFees");
}

/// Category totals that fit individually but not together are reported too.
#[test]
fn overflowing_total_fees_are_an_error() {
    let catalog = RuleCatalog::default_test();
    let mut config = dealer_with_fees(&[Decimal::MAX]);
    config.packages[0].fees.push(DealerFee {
        fee_code:    "ADDON".into(),
        description: "Add-on".into(),
        amount:      Decimal::MAX,
        category:    FeeCategory::Customer,
    });

    let field = invalid_field(calculate(&financed_deal(), &catalog.rules, &config, as_of()));
    assert_eq!(field, "totalFees");
}
