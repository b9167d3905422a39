//! Condition trees attached to government-fee rules.
//!
//! Wire shape: `{"<op>": [lhs, rhs]}` for comparisons and `and`/`or`,
//! `{"not": x}` for negation, `{"var": "dotted.path"}` for lookups and
//! plain JSON scalars for literals. Nesting is unbounded.
//!
//! RULE: evaluation never fails. Missing data resolves to null, null never
//! satisfies a comparison, and a tree containing an operator we do not know
//! evaluates to `false` as a whole.

use crate::{input::ScenarioInput, scenario_detector::Scenario};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};
use std::cmp::Ordering;
use std::str::FromStr;

/// A resolved operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Null      => false,
            Value::Bool(b)   => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Text(s)   => !s.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            ">"           => Some(CompareOp::Gt),
            ">="          => Some(CompareOp::Gte),
            "<"           => Some(CompareOp::Lt),
            "<="          => Some(CompareOp::Lte),
            "==" | "==="  => Some(CompareOp::Eq),
            "!=" | "!=="  => Some(CompareOp::Ne),
            _             => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt  => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt  => "<",
            CompareOp::Lte => "<=",
            CompareOp::Eq  => "==",
            CompareOp::Ne  => "!=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Gt  => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt  => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Eq  => ordering == Ordering::Equal,
            CompareOp::Ne  => ordering != Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Condition {
    Literal(Value),
    Var(String),
    Compare {
        op:  CompareOp,
        lhs: Box<Condition>,
        rhs: Box<Condition>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Kept verbatim so the rule still round-trips through storage.
    Unsupported {
        op:   String,
        args: serde_json::Value,
    },
}

impl Default for Condition {
    /// No condition means the rule always matches.
    fn default() -> Self {
        Condition::Literal(Value::Bool(true))
    }
}

impl Condition {
    pub fn always() -> Self {
        Condition::default()
    }

    pub fn var(path: &str) -> Self {
        Condition::Var(path.to_string())
    }

    pub fn number(n: Decimal) -> Self {
        Condition::Literal(Value::Number(n))
    }

    pub fn compare(op: CompareOp, lhs: Condition, rhs: Condition) -> Self {
        Condition::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// First operator in the tree the evaluator does not understand.
    pub fn unsupported_operator(&self) -> Option<&str> {
        match self {
            Condition::Unsupported { op, .. } => Some(op),
            Condition::Compare { lhs, rhs, .. } => lhs
                .unsupported_operator()
                .or_else(|| rhs.unsupported_operator()),
            Condition::And(items) | Condition::Or(items) => {
                items.iter().find_map(Condition::unsupported_operator)
            }
            Condition::Not(inner) => inner.unsupported_operator(),
            Condition::Literal(_) | Condition::Var(_) => None,
        }
    }
}

/// Read-only view over the deal that `var` lookups resolve against.
pub struct EvaluationContext<'a> {
    pub input:    &'a ScenarioInput,
    pub scenario: &'a Scenario,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(input: &'a ScenarioInput, scenario: &'a Scenario) -> Self {
        Self { input, scenario }
    }

    /// Resolve a dotted path. Paths may carry an `input.` or `scenario.`
    /// prefix; both namespaces are flat so the prefix is optional.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let path = path
            .strip_prefix("input.")
            .or_else(|| path.strip_prefix("scenario."))
            .unwrap_or(path);
        let segments: Vec<&str> = path.split('.').collect();
        let input = self.input;
        let scenario = self.scenario;

        let value = match segments.as_slice() {
            ["salePrice"]               => Value::Number(input.sale_price),
            ["cashDown"]                => Value::Number(input.cash_down),
            ["loanTerm"]                => Value::Number(Decimal::from(input.loan_term)),
            ["apr"]                     => Value::Number(input.apr),
            ["tradeInEquity"]           => Value::Number(input.trade_in_equity()),
            ["isFirstTimeRegistration"] => Value::Bool(scenario.is_first_time_registration),
            ["hasTradeIn"]              => Value::Bool(scenario.has_trade_in),
            ["isFinanced"]              => Value::Bool(scenario.is_financed),
            ["plateScenario"]           => Value::Text(scenario.plate_scenario.as_str().to_string()),
            ["description"]             => Value::Text(scenario.description.clone()),
            ["tradeIns", "length"]      => Value::Number(Decimal::from(input.trade_ins.len())),
            ["tradeIns", index, field]  => {
                let trade = input.trade_ins.get(index.parse::<usize>().ok()?)?;
                match *field {
                    "estimatedValue" => Value::Number(trade.estimated_value),
                    "payoffAmount"   => Value::Number(trade.payoff_amount),
                    "equity"         => Value::Number(trade.equity()),
                    _ => return None,
                }
            }
            ["jurisdiction", "stateCode"]  => Value::Text(input.jurisdiction.state_code.clone()),
            ["jurisdiction", "countyName"] => Value::Text(input.jurisdiction.county_name.clone()?),
            _ => return None,
        };
        Some(value)
    }
}

/// Evaluate a condition tree. Fails closed, never panics.
pub fn evaluate(condition: &Condition, ctx: &EvaluationContext<'_>) -> bool {
    if condition.unsupported_operator().is_some() {
        return false;
    }
    resolve(condition, ctx).truthy()
}

fn resolve(condition: &Condition, ctx: &EvaluationContext<'_>) -> Value {
    match condition {
        Condition::Literal(value) => value.clone(),
        Condition::Var(path) => ctx.lookup(path).unwrap_or(Value::Null),
        Condition::Compare { op, lhs, rhs } => {
            let lhs = resolve(lhs, ctx);
            let rhs = resolve(rhs, ctx);
            Value::Bool(compare(*op, &lhs, &rhs))
        }
        Condition::And(items) => Value::Bool(items.iter().all(|c| resolve(c, ctx).truthy())),
        Condition::Or(items) => Value::Bool(items.iter().any(|c| resolve(c, ctx).truthy())),
        Condition::Not(inner) => Value::Bool(!resolve(inner, ctx).truthy()),
        Condition::Unsupported { .. } => Value::Bool(false),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => op.holds(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => op.holds(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            _ => false,
        },
        _ => false,
    }
}

// ── Wire format ────────────────────────────────────────────────────

impl TryFrom<serde_json::Value> for Condition {
    type Error = String;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        match raw {
            serde_json::Value::Null => Ok(Condition::Literal(Value::Null)),
            serde_json::Value::Bool(b) => Ok(Condition::Literal(Value::Bool(b))),
            serde_json::Value::String(s) => Ok(Condition::Literal(Value::Text(s))),
            serde_json::Value::Number(n) => Ok(Condition::Literal(Value::Number(decimal_from_json(&n)?))),
            serde_json::Value::Array(_) => Err("bare array is not a condition".to_string()),
            serde_json::Value::Object(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "condition node must have exactly one operator, found {}",
                        map.len()
                    ));
                }
                let Some((op, args)) = map.into_iter().next() else {
                    return Err("empty condition node".to_string());
                };
                decode_node(op, args)
            }
        }
    }
}

/// Number literal that a JSON float cannot carry exactly.
const DECIMAL_NODE: &str = "decimal";

fn decode_node(op: String, args: serde_json::Value) -> Result<Condition, String> {
    if op == "var" {
        let path = match &args {
            serde_json::Value::String(path) => Some(path.clone()),
            serde_json::Value::Array(items) => items.first().and_then(|p| p.as_str()).map(str::to_string),
            _ => None,
        };
        return path
            .map(Condition::Var)
            .ok_or_else(|| "var expects a path string".to_string());
    }

    if op == DECIMAL_NODE {
        let text = args
            .as_str()
            .ok_or_else(|| "decimal expects a numeric string".to_string())?;
        let n = Decimal::from_str(text).map_err(|e| format!("bad decimal '{text}': {e}"))?;
        return Ok(Condition::number(n));
    }

    if let Some(compare_op) = CompareOp::parse(&op) {
        let mut operands = operand_list(args)?;
        if operands.len() != 2 {
            return Err(format!("'{op}' expects 2 operands, found {}", operands.len()));
        }
        let rhs = operands.pop().ok_or("missing rhs")?;
        let lhs = operands.pop().ok_or("missing lhs")?;
        return Ok(Condition::compare(compare_op, lhs, rhs));
    }

    match op.as_str() {
        "and" | "or" => {
            let operands = operand_list(args)?;
            if operands.is_empty() {
                return Err(format!("'{op}' expects at least one operand"));
            }
            Ok(if op == "and" {
                Condition::And(operands)
            } else {
                Condition::Or(operands)
            })
        }
        "not" | "!" => {
            let mut operands = operand_list(args)?;
            if operands.len() != 1 {
                return Err(format!("'{op}' expects 1 operand, found {}", operands.len()));
            }
            let inner = operands.pop().ok_or("missing operand")?;
            Ok(Condition::Not(Box::new(inner)))
        }
        _ => Ok(Condition::Unsupported { op, args }),
    }
}

/// Operands are normally an array; a single bare operand is also accepted.
fn operand_list(args: serde_json::Value) -> Result<Vec<Condition>, String> {
    match args {
        serde_json::Value::Array(items) => items.into_iter().map(Condition::try_from).collect(),
        other => Ok(vec![Condition::try_from(other)?]),
    }
}

fn decimal_from_json(n: &Number) -> Result<Decimal, String> {
    if let Some(i) = n.as_i64() {
        return Ok(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Decimal::from(u));
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| format!("number {text} out of range: {e}"))
}

/// Exact encoding: a plain JSON number when it reads back to the same value,
/// otherwise `{"decimal": "<text>"}`.
fn decimal_to_json(d: Decimal) -> serde_json::Value {
    let d = d.normalize();
    if d.scale() == 0 {
        if let Some(i) = d.to_i64() {
            return serde_json::Value::from(i);
        }
    }
    let exact = d
        .to_f64()
        .and_then(Number::from_f64)
        .filter(|n| decimal_from_json(n).map_or(false, |back| back == d));
    match exact {
        Some(n) => serde_json::Value::Number(n),
        None => {
            let mut map = Map::new();
            map.insert(DECIMAL_NODE.to_string(), serde_json::Value::String(d.to_string()));
            serde_json::Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Jurisdiction, TradeIn};
    use crate::scenario_detector::detect;
    use serde_json::json;

    fn input(trade_ins: usize) -> ScenarioInput {
        ScenarioInput {
            sale_price: Decimal::from(25_000),
            cash_down: Decimal::ZERO,
            loan_term: 60,
            apr: Decimal::from(6),
            trade_ins: (0..trade_ins)
                .map(|_| TradeIn {
                    estimated_value: Decimal::from(8_000),
                    payoff_amount: Decimal::from(5_000),
                })
                .collect(),
            jurisdiction: Jurisdiction {
                state_code: "FL".into(),
                county_name: Some("Brevard".into()),
            },
            is_first_time_registration: false,
            plate_scenario: None,
        }
    }

    fn eval(raw: serde_json::Value, input: &ScenarioInput) -> bool {
        let condition: Condition = serde_json::from_value(raw).unwrap();
        let scenario = detect(input);
        evaluate(&condition, &EvaluationContext::new(input, &scenario))
    }

    #[test]
    fn compares_trade_in_count() {
        let deal = input(1);
        assert!(eval(json!({">": [{"var": "tradeIns.length"}, 0]}), &deal));
        assert!(!eval(json!({"==": [{"var": "tradeIns.length"}, 0]}), &deal));
    }

    #[test]
    fn unresolved_path_fails_closed() {
        let deal = input(0);
        assert!(!eval(json!({">": [{"var": "nonexistent.field"}, 0]}), &deal));
        assert!(!eval(json!({"!=": [{"var": "nonexistent.field"}, 0]}), &deal));
        assert!(!eval(json!({"==": [null, null]}), &deal));
    }

    #[test]
    fn logical_operators_compose() {
        let deal = input(1);
        let raw = json!({"and": [
            {"var": "hasTradeIn"},
            {"or": [{"==": [{"var": "plateScenario"}, "TransferExistingPlate"]}, false]},
            {"not": {"var": "isFirstTimeRegistration"}}
        ]});
        assert!(eval(raw, &deal));
    }

    #[test]
    fn unknown_operator_fails_closed_even_under_not() {
        let deal = input(0);
        let raw = json!({"not": {"between": [{"var": "salePrice"}, 0, 10]}});
        let condition: Condition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(condition.unsupported_operator(), Some("between"));
        assert!(!eval(raw, &deal));
    }

    #[test]
    fn prefixed_paths_and_indexed_trade_ins_resolve() {
        let deal = input(1);
        assert!(eval(json!({">=": [{"var": "input.tradeIns.0.equity"}, 3000]}), &deal));
        assert!(eval(json!({"==": [{"var": "scenario.isFinanced"}, true]}), &deal));
        assert!(eval(json!({"==": [{"var": "jurisdiction.countyName"}, "Brevard"]}), &deal));
        assert!(!eval(json!({">": [{"var": "tradeIns.3.equity"}, 0]}), &deal));
    }

    #[test]
    fn mixed_types_never_match() {
        let deal = input(0);
        assert!(!eval(json!({"==": [{"var": "salePrice"}, "25000"]}), &deal));
        assert!(!eval(json!({">": [{"var": "hasTradeIn"}, false]}), &deal));
    }

    #[test]
    fn malformed_shapes_are_rejected_at_decode() {
        assert!(serde_json::from_value::<Condition>(json!({">": [1]})).is_err());
        assert!(serde_json::from_value::<Condition>(json!({"var": 3})).is_err());
        assert!(serde_json::from_value::<Condition>(json!({"a": 1, "b": 2})).is_err());
        assert!(serde_json::from_value::<Condition>(json!([1, 2])).is_err());
    }

    #[test]
    fn wire_form_survives_storage() {
        let raw = json!({"and": [
            {">": [{"var": "salePrice"}, 1000.5]},
            {"<": [{"var": "salePrice"}, {"decimal": "25000.000000000000000000001"}]},
            {"custom_op": [1, 2]}
        ]});
        let condition: Condition = serde_json::from_value(raw).unwrap();
        let stored = serde_json::to_string(&condition).unwrap();
        let reloaded: Condition = serde_json::from_str(&stored).unwrap();
        assert_eq!(condition, reloaded);
    }

    #[test]
    fn high_precision_literal_survives_storage() {
        let threshold = Decimal::from_str("25000.000000000000000000001").unwrap();
        let condition = Condition::compare(
            CompareOp::Gt,
            Condition::var("salePrice"),
            Condition::number(threshold),
        );

        let stored = serde_json::to_string(&condition).unwrap();
        let reloaded: Condition = serde_json::from_str(&stored).unwrap();
        assert_eq!(condition, reloaded);

        // 25000 is not above the exact threshold, before or after storage.
        let deal = input(0);
        let scenario = detect(&deal);
        let ctx = EvaluationContext::new(&deal, &scenario);
        assert!(!evaluate(&condition, &ctx));
        assert!(!evaluate(&reloaded, &ctx));
    }

    #[test]
    fn decimal_node_rejects_non_numeric_text() {
        assert!(serde_json::from_value::<Condition>(json!({"decimal": "abc"})).is_err());
        assert!(serde_json::from_value::<Condition>(json!({"decimal": 1.5})).is_err());
    }
}
