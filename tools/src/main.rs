//! quote-runner: headless fee and tax quote for a single deal.
//!
//! Usage:
//!   quote-runner --input deal.json [--data-dir ./data] [--dealer demo-dealer]
//!                [--as-of 2025-06-01] [--db audit.db] [--summary]
//!   quote-runner --db audit.db --replay <audit-id>

use anyhow::Result;
use chrono::{Local, NaiveDate};
use dealdesk_core::{
    audit::{self, ReplayOutcome},
    calculate,
    config::{EngineSettings, RuleCatalog},
    dealer::DealerConfig,
    financing::{summarize, FinancingSummary},
    money::format_usd,
    provider::{CachedDealerConfigProvider, CachedRuleProvider, DealerConfigProvider, RuleProvider},
    store::AuditStore,
    FeeCategory, ScenarioInput, ScenarioResult,
};
use std::env;
use std::sync::Arc;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    audit_id:  Option<&'a str>,
    result:    &'a ScenarioResult,
    financing: &'a FinancingSummary,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let db = str_arg(&args, "--db");
    let summary = args.iter().any(|a| a == "--summary");

    if let Some(audit_id) = str_arg(&args, "--replay") {
        let Some(db) = db else {
            anyhow::bail!("--replay needs --db <path>");
        };
        return run_replay(db, audit_id);
    }

    let Some(input_path) = str_arg(&args, "--input") else {
        anyhow::bail!("usage: quote-runner --input deal.json [--data-dir ./data] [--db audit.db]");
    };
    let as_of = as_of_arg(&args, Local::now().date_naive())?;

    let settings = EngineSettings::load(data_dir)?;
    let catalog = Arc::new(RuleCatalog::load(data_dir)?);
    let rule_provider = CachedRuleProvider::with_ttl(Arc::clone(&catalog), settings.rule_cache_ttl());
    let dealer_provider = CachedDealerConfigProvider::with_ttl(catalog, settings.dealer_cache_ttl());

    let content = std::fs::read_to_string(input_path)
        .map_err(|e| anyhow::anyhow!("Cannot read {input_path}: {e}"))?;
    let input: ScenarioInput = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Cannot parse {input_path}: {e}"))?;

    let rules = rule_provider.rules_for(
        &input.jurisdiction.state_code,
        input.jurisdiction.county_name.as_deref(),
    )?;

    let dealer_config = match str_arg(&args, "--dealer").or(settings.default_dealer_id.as_deref()) {
        Some(dealer_id) => dealer_provider.dealer_config(dealer_id)?,
        None => {
            log::warn!("runner: no dealer given and no default_dealer_id configured");
            Arc::new(DealerConfig::empty("none"))
        }
    };

    let (audit_id, result) = match db {
        Some(db) => {
            let store = AuditStore::open(db)?;
            store.migrate()?;
            let (audit_id, result) =
                audit::record_calculation(&store, &input, &rules, &dealer_config, as_of)?;
            (Some(audit_id), result)
        }
        None => (None, calculate(&input, &rules, &dealer_config, as_of)?),
    };
    let financing = summarize(&input, &result)?;

    if summary {
        print_quote(&input, &result, &financing, audit_id.as_deref());
    } else {
        let output = QuoteOutput {
            audit_id: audit_id.as_deref(),
            result: &result,
            financing: &financing,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn run_replay(db: &str, audit_id: &str) -> Result<()> {
    let store = AuditStore::open(db)?;
    store.migrate()?;
    let outcome: ReplayOutcome = audit::replay(&store, audit_id)?;

    println!("=== REPLAY ===");
    println!("  audit_id:        {}", outcome.audit_id);
    println!("  recorded engine: {}", outcome.engine_version);
    println!("  current engine:  {}", audit::ENGINE_VERSION);
    println!("  matches:         {}", outcome.matches);
    if !outcome.matches {
        println!();
        println!("  recorded: {}", outcome.recorded_json);
        println!("  replayed: {}", outcome.replayed_json);
        anyhow::bail!("replay of {audit_id} did not reproduce the recorded result");
    }
    Ok(())
}

fn print_quote(
    input: &ScenarioInput,
    result: &ScenarioResult,
    financing: &FinancingSummary,
    audit_id: Option<&str>,
) {
    println!("=== QUOTE ===");
    println!("  jurisdiction:   {}", input.jurisdiction.label());
    println!("  as of:          {}", result.as_of);
    println!("  scenario:       {}", result.scenario.description);
    println!("  sale price:     {}", format_usd(input.sale_price));
    if let Some(audit_id) = audit_id {
        println!("  audit_id:       {audit_id}");
    }

    for (heading, category) in [
        ("GOVERNMENT FEES", FeeCategory::Government),
        ("DEALER FEES", FeeCategory::Dealer),
        ("CUSTOMER ADD-ONS", FeeCategory::Customer),
    ] {
        println!();
        println!("=== {heading} ===");
        let mut any = false;
        for item in result.items_in(category) {
            any = true;
            println!("  {:<24} {:>12}  {}", item.fee_code, format_usd(item.amount), item.description);
        }
        if !any {
            println!("  (none)");
        }
    }

    let tax = &result.tax_breakdown;
    println!();
    println!("=== SALES TAX ===");
    println!("  taxable base:   {}", format_usd(tax.taxable_base));
    println!("  state tax:      {} ({})", format_usd(tax.state_tax), tax.state_rate);
    println!(
        "  county tax:     {} ({}{})",
        format_usd(tax.county_tax),
        tax.county_rate,
        if tax.county_tax_capped { ", capped" } else { "" }
    );
    println!("  total tax:      {}", format_usd(tax.total_tax));

    println!();
    println!("=== TOTALS ===");
    println!("  fees:           {}", format_usd(result.totals.total_fees));
    println!("  sales tax:      {}", format_usd(result.totals.sales_tax));
    println!("  financed:       {}", format_usd(financing.amount_financed));
    if let (Some(term), Some(payment)) = (financing.normalized_term, financing.monthly_payment) {
        println!(
            "  payment:        {}/mo over {} months (rate sheet term {term})",
            format_usd(payment),
            input.loan_term
        );
    }

    if !result.explanations.is_empty() {
        println!();
        println!("=== NOTES ===");
        for note in &result.explanations {
            println!("  - {note}");
        }
    }
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// `--as-of YYYY-MM-DD`, or `today` when the flag is absent. A malformed
/// date is an error.
fn as_of_arg(args: &[String], today: NaiveDate) -> Result<NaiveDate> {
    match str_arg(args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("--as-of '{raw}' is not a YYYY-MM-DD date: {e}")),
        None => {
            if args.last().is_some_and(|a| a == "--as-of") {
                anyhow::bail!("--as-of needs a YYYY-MM-DD date");
            }
            Ok(today)
        }
    }
}
