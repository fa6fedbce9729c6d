//! Parsed-request types — the structured, size-reduced form of a raw
//! captured HTTP request.
//!
//! A [`ParsedRequest`] is produced once by the compressor and then flows
//! unchanged through the cache, the context assembler, and the engine. It
//! carries only attack-relevant data: the critical-field projection, the
//! detected patterns, and the derived attack vectors — never the full raw
//! request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Request category, decided by an ordered first-match classification.
///
/// The order AUTH → PAYMENT → REFUND → API → PROFILE → WORKFLOW → ADMIN →
/// SEARCH is a hard contract: a request matching both AUTH and PAYMENT
/// signals classifies as AUTH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Auth,
    Payment,
    Refund,
    Api,
    Profile,
    Workflow,
    Admin,
    Search,
    Unknown,
}

impl Category {
    /// Canonical uppercase name, as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Auth => "AUTH",
            Category::Payment => "PAYMENT",
            Category::Refund => "REFUND",
            Category::Api => "API",
            Category::Profile => "PROFILE",
            Category::Workflow => "WORKFLOW",
            Category::Admin => "ADMIN",
            Category::Search => "SEARCH",
            Category::Unknown => "UNKNOWN",
        }
    }

    /// Lenient decode for stored rows; anything unrecognized is UNKNOWN.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "AUTH" => Category::Auth,
            "PAYMENT" => Category::Payment,
            "REFUND" => Category::Refund,
            "API" => Category::Api,
            "PROFILE" => Category::Profile,
            "WORKFLOW" => Category::Workflow,
            "ADMIN" => Category::Admin,
            "SEARCH" => Category::Search,
            _ => Category::Unknown,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category critical-field projection.
///
/// Each category keeps only the fields worth testing; everything else from
/// the body is dropped. Categories without a dedicated projection fall back
/// to [`CriticalData::Generic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriticalData {
    Auth {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        providers: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
    },
    Payment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<serde_json::Value>,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<serde_json::Value>,
    },
    Refund {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Api {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variables: Option<serde_json::Value>,
    },
    Generic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

impl CriticalData {
    /// An empty generic projection, used for bodyless requests.
    pub fn empty() -> Self {
        CriticalData::Generic {
            id: None,
            action: None,
            data: None,
        }
    }

    /// Serialized form used for size accounting and the context digest.
    ///
    /// Serialization of these shapes cannot fail; an empty string would
    /// only appear if it somehow did, and then size accounting degrades
    /// to ratio 0 rather than panicking.
    pub fn serialized(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Structured, size-reduced representation of a raw captured HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRequest {
    /// Content-addressed id: SHA-256 hex of the raw input text.
    pub hash: String,

    /// HTTP method; `GET` when the request line is missing.
    pub method: String,

    /// Request path without query string; `/` when missing.
    pub endpoint: String,

    /// Value of the `Host` header, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Query-string parameters, ordered by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Critical-field projection of the body, keyed by category.
    pub critical: CriticalData,

    /// Security-relevant headers only, values truncated.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Detected behavioral pattern names (deduplicated, detection order).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,

    /// Classified category.
    pub category: Category,

    /// Candidate attack vectors (deduplicated, derivation order).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attack_vectors: Vec<String>,

    /// Length of the raw input text in bytes.
    pub original_size: usize,

    /// Length of the serialized critical projection in bytes.
    pub compressed_size: usize,

    /// `1 − compressed/original`; 0 for empty input.
    pub compression_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_name() {
        for cat in [
            Category::Auth,
            Category::Payment,
            Category::Refund,
            Category::Api,
            Category::Profile,
            Category::Workflow,
            Category::Admin,
            Category::Search,
            Category::Unknown,
        ] {
            assert_eq!(Category::from_name(cat.as_str()), cat);
        }
    }

    #[test]
    fn unrecognized_category_decodes_as_unknown() {
        assert_eq!(Category::from_name("FRAUD"), Category::Unknown);
        assert_eq!(Category::from_name(""), Category::Unknown);
    }

    #[test]
    fn category_serializes_uppercase() {
        let json = serde_json::to_string(&Category::Payment).unwrap();
        assert_eq!(json, "\"PAYMENT\"");
    }

    #[test]
    fn critical_data_omits_absent_fields() {
        let critical = CriticalData::Payment {
            amount: Some(serde_json::json!(-1)),
            currency: "EUR".into(),
            method: None,
            items: None,
        };
        let json = critical.serialized();
        assert!(json.contains("\"kind\":\"payment\""));
        assert!(json.contains("-1"));
        assert!(!json.contains("method"));
    }

    #[test]
    fn critical_data_serialization_is_deterministic() {
        let critical = CriticalData::Auth {
            email: Some("a@b.c".into()),
            providers: vec!["Google".into(), "Apple".into()],
            token: None,
            service: None,
        };
        assert_eq!(critical.serialized(), critical.serialized());
    }
}
