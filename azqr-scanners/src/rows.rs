//! Field access on Resource Graph rows

use std::collections::BTreeMap;

use azqr_core::infrastructure::graph::GraphRow;
use serde_json::Value;

/// Value rendered as a report string: text as-is, missing or null as empty,
/// anything else as compact JSON
pub fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn field(row: &GraphRow, key: &str) -> String {
    render(row.get(key))
}

/// Subscription ids of an id → name map, in key order
pub fn subscription_ids(subscriptions: &BTreeMap<String, String>) -> Vec<String> {
    subscriptions.keys().cloned().collect()
}

/// Numeric field, accepting numbers and numeric strings
pub fn number(row: &GraphRow, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
