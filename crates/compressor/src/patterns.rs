//! Behavioral pattern detection over the critical projection.
//!
//! Patterns are cheap structural signals ("this request carries a negative
//! amount"), not verdicts. They feed three consumers: attack-vector
//! derivation, L3 cache lookups, and pattern statistics in the store.

use redtalon_core::{Category, CriticalData};
use serde_json::Value;

/// Detect pattern names, generic first, then category-specific.
/// The output is deduplicated by construction and ordered by detection.
pub fn detect(category: Category, critical: &CriticalData, body: &Value) -> Vec<String> {
    let mut patterns = Vec::new();

    if let Some(amount) = amount_of(critical) {
        if is_negative_value(amount) {
            patterns.push("negative-value".to_string());
        }
    }

    if providers_of(critical).len() > 1 {
        patterns.push("multi-provider".to_string());
    }

    if let Some(token) = token_of(critical) {
        if token.starts_with("eyJ") {
            patterns.push("jwt-token".to_string());
        }
    }

    match category {
        Category::Auth => {
            let providers = providers_of(critical);
            if providers.iter().any(|p| p == "Google") && providers.iter().any(|p| p == "Apple") {
                patterns.push("oauth-mixing".to_string());
            }
            if let CriticalData::Auth {
                service: Some(service),
                ..
            } = critical
            {
                if service.contains("Login") && service.contains("Register") {
                    patterns.push("dual-flow".to_string());
                }
            }
        }
        Category::Payment => {
            if let Some(amount) = amount_of(critical) {
                if is_zero_amount(amount) {
                    patterns.push("zero-amount".to_string());
                }
            }
            if let CriticalData::Payment {
                items: Some(items), ..
            } = critical
            {
                if has_negative_quantity(items) {
                    patterns.push("negative-quantity".to_string());
                }
            }
        }
        Category::Workflow => {
            if is_present(body.get("step")) && is_present(body.get("skip")) {
                patterns.push("step-bypass-attempt".to_string());
            }
        }
        _ => {}
    }

    patterns
}

fn amount_of(critical: &CriticalData) -> Option<&Value> {
    match critical {
        CriticalData::Payment { amount, .. } | CriticalData::Refund { amount, .. } => {
            amount.as_ref()
        }
        _ => None,
    }
}

fn providers_of(critical: &CriticalData) -> &[String] {
    match critical {
        CriticalData::Auth { providers, .. } => providers,
        _ => &[],
    }
}

fn token_of(critical: &CriticalData) -> Option<&str> {
    match critical {
        CriticalData::Auth { token, .. } => token.as_deref(),
        _ => None,
    }
}

/// Negative by value, or the literal probe strings "0" / "-1".
fn is_negative_value(amount: &Value) -> bool {
    match amount {
        Value::Number(n) => n.as_f64().is_some_and(|f| f < 0.0),
        Value::String(s) => {
            s == "0" || s == "-1" || s.parse::<f64>().is_ok_and(|f| f < 0.0)
        }
        _ => false,
    }
}

/// Exactly zero as a number, or the display form "0.00".
fn is_zero_amount(amount: &Value) -> bool {
    match amount {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s == "0.00",
        _ => false,
    }
}

fn has_negative_quantity(items: &Value) -> bool {
    let Value::Array(items) = items else {
        return false;
    };
    items.iter().any(|item| {
        match item.get("quantity") {
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f < 0.0),
            Some(Value::String(s)) => s.parse::<f64>().is_ok_and(|f| f < 0.0),
            _ => false,
        }
    })
}

/// Present and not an "empty" value (null, false, 0, "").
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
