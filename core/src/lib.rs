//! dealdesk-core: vehicle fee and sales-tax decision engine.
//!
//! `fee_calculator::calculate` is the single entry point. Everything it needs
//! is passed in; rule and dealer lookups live behind the `provider` traits,
//! and only `store` talks to the database.

pub mod audit;
pub mod condition;
pub mod config;
pub mod dealer;
pub mod error;
pub mod fee_calculator;
pub mod financing;
pub mod input;
pub mod loan_terms;
pub mod money;
pub mod provider;
pub mod result;
pub mod rule;
pub mod rule_decoder;
pub mod rules_evaluator;
pub mod scenario_detector;
pub mod store;
pub mod tax_calculator;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use fee_calculator::calculate;
pub use input::{Jurisdiction, ScenarioInput, TradeIn};
pub use result::{FeeCategory, LineItem, ScenarioResult, Totals};
