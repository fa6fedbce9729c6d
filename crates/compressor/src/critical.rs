//! Per-category critical-field projection.
//!
//! Reduces the free-form body/params to the handful of fields worth
//! testing for that category. Fallback chains mirror where real traffic
//! hides each value (body first, then query parameters).

use redtalon_core::{Category, CriticalData};
use serde_json::Value;

use crate::raw::RawRequest;

/// Project the parsed parts down to the category's critical fields.
pub fn extract(category: Category, req: &RawRequest) -> CriticalData {
    match category {
        Category::Auth => CriticalData::Auth {
            email: req
                .body_str("email")
                .or_else(|| req.body_str("username"))
                .or_else(|| req.param("email"))
                .map(str::to_string),
            providers: providers(req),
            token: req
                .body_str("authId")
                .or_else(|| req.body_str("token"))
                .or_else(|| req.header("Authorization"))
                .map(str::to_string),
            service: req
                .param("service")
                .or_else(|| req.param("client_id"))
                .map(str::to_string),
        },
        Category::Payment => CriticalData::Payment {
            amount: req
                .body_field("amount")
                .or_else(|| req.body_field("price"))
                .cloned()
                .or_else(|| req.param("amount").map(|s| Value::String(s.to_string()))),
            currency: req
                .body_str("currency")
                .or_else(|| req.param("currency"))
                .unwrap_or("EUR")
                .to_string(),
            method: req
                .body_str("payment_method")
                .or_else(|| req.param("method"))
                .map(str::to_string),
            items: req
                .body_field("items")
                .or_else(|| req.body_field("cart"))
                .cloned(),
        },
        Category::Refund => CriticalData::Refund {
            amount: req
                .body_field("amount")
                .cloned()
                .or_else(|| req.param("amount").map(|s| Value::String(s.to_string()))),
            order_id: req
                .body_str("order_id")
                .or_else(|| req.param("order"))
                .map(str::to_string),
            reason: req.body_str("reason").map(str::to_string),
        },
        Category::Api => CriticalData::Api {
            endpoint: Some(req.full_path.clone()),
            query: req
                .body_str("query")
                .or_else(|| req.param("query"))
                .map(str::to_string),
            variables: req.body_field("variables").cloned(),
        },
        _ => CriticalData::Generic {
            id: req
                .body_str("id")
                .or_else(|| req.param("id"))
                .map(str::to_string),
            action: req
                .body_str("action")
                .or_else(|| req.param("action"))
                .map(str::to_string),
            data: req
                .body_field("data")
                .cloned()
                .or_else(|| req.param("data").map(|s| Value::String(s.to_string()))),
        },
    }
}

/// Auth providers: a plain list, or pulled out of OAuth callback entries.
fn providers(req: &RawRequest) -> Vec<String> {
    if let Some(Value::Array(list)) = req.body_field("providers") {
        return list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    if let Some(Value::Array(callbacks)) = req.body_field("callbacks") {
        return callbacks
            .iter()
            .filter_map(|c| c.get("provider").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }
    Vec::new()
}
