//! Request compression for redtalon.
//!
//! Takes raw HTTP request text (the kind pasted out of a proxy) and reduces
//! it to the handful of fields that actually matter for security analysis:
//! a stable content hash, the category of the endpoint, the critical
//! parameters for that category, any suspicious value patterns, and the
//! attack vectors worth trying. Everything here is pure — no I/O, no
//! clocks, no randomness — so the same text always compresses to the same
//! [`ParsedRequest`].

use std::collections::BTreeMap;

use redtalon_core::ParsedRequest;
use sha2::{Digest, Sha256};

mod classify;
mod critical;
mod digest;
mod patterns;
mod raw;
mod vectors;

pub use digest::compress_for_context;
pub use vectors::category_vectors;

/// Headers worth keeping in the compressed form. Everything else is noise
/// for analysis purposes and gets dropped.
const CRITICAL_HEADERS: &[&str] = &[
    "Authorization",
    "Cookie",
    "X-CSRF-Token",
    "X-API-Key",
    "Content-Type",
    "Origin",
    "Referer",
];

const HEADER_VALUE_CHARS: usize = 100;

/// Parse raw HTTP request text into its compressed, analysis-ready form.
///
/// Never fails: malformed input degrades to defaults (method `GET`, empty
/// body, `UNKNOWN` category) rather than erroring, because half-pasted
/// requests are the common case, not the exception.
pub fn parse(raw_text: &str) -> ParsedRequest {
    let hash = content_hash(raw_text);
    let req = raw::split_raw(raw_text);

    let category = classify::classify(&req.full_path, &req.body_text);
    let critical = critical::extract(category, &req);
    let patterns = patterns::detect(category, &critical, &req.body);
    let attack_vectors = vectors::derive(category, &patterns);

    let domain = req.header("Host").map(str::to_owned);
    let headers = critical_headers(&req);

    let original_size = raw_text.len();
    let compressed_size = critical.serialized().len();
    let compression_ratio = if original_size == 0 {
        0.0
    } else {
        1.0 - compressed_size as f64 / original_size as f64
    };

    ParsedRequest {
        hash,
        method: req.method.clone(),
        endpoint: req.endpoint.clone(),
        domain,
        params: req.params.clone(),
        critical,
        headers,
        patterns,
        category,
        attack_vectors,
        original_size,
        compressed_size,
        compression_ratio,
    }
}

/// SHA-256 of the full raw text, hex encoded. Used as the cache identity
/// for exact-match lookups.
pub fn content_hash(raw_text: &str) -> String {
    let digest = Sha256::digest(raw_text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn critical_headers(req: &raw::RawRequest) -> BTreeMap<String, String> {
    let mut kept = BTreeMap::new();
    for name in CRITICAL_HEADERS {
        if let Some(value) = req.header(name) {
            let bounded: String = value.chars().take(HEADER_VALUE_CHARS).collect();
            kept.insert((*name).to_owned(), bounded);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use redtalon_core::{Category, CriticalData};

    #[test]
    fn parse_is_pure() {
        let raw = "POST /login HTTP/1.1\nHost: app.example\nContent-Type: application/json\n\n{\"email\":\"a@b.c\"}";
        let first = parse(raw);
        let second = parse(raw);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.category, second.category);
        assert_eq!(first.patterns, second.patterns);
        assert_eq!(first.attack_vectors, second.attack_vectors);
        assert_eq!(first.compression_ratio, second.compression_ratio);
    }

    #[test]
    fn distinct_inputs_get_distinct_hashes() {
        let a = parse("GET /a HTTP/1.1\n\n");
        let b = parse("GET /b HTTP/1.1\n\n");
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
        assert!(a.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn login_checkout_is_auth_not_payment() {
        let parsed = parse("POST /login/checkout HTTP/1.1\nHost: shop.example\n\n{}");
        assert_eq!(parsed.category, Category::Auth);
    }

    #[test]
    fn payment_path_with_negative_amount() {
        let parsed = parse("GET /api/payment/process?amount=-1 HTTP/1.1\nHost: shop.example\n\n");
        assert_eq!(parsed.category, Category::Payment);
        assert!(parsed.patterns.iter().any(|p| p == "negative-value"));
        assert!(
            parsed
                .attack_vectors
                .iter()
                .any(|v| v == "price-manipulation")
        );
        assert!(
            parsed
                .attack_vectors
                .iter()
                .any(|v| v == "negative-value-exploitation")
        );
        match &parsed.critical {
            CriticalData::Payment { amount, .. } => {
                assert_eq!(amount.as_ref().and_then(|v| v.as_str()), Some("-1"));
            }
            other => panic!("expected payment critical data, got {other:?}"),
        }
    }

    #[test]
    fn only_critical_headers_survive_and_are_bounded() {
        let long_cookie = "c".repeat(500);
        let raw = format!(
            "GET /profile HTTP/1.1\nHost: app.example\nCookie: {long_cookie}\nAccept: */*\nX-Api-Key: sk-123\n\n"
        );
        let parsed = parse(&raw);
        assert_eq!(parsed.headers.get("Cookie").map(String::len), Some(100));
        assert_eq!(parsed.headers.get("X-API-Key").map(String::as_str), Some("sk-123"));
        assert!(!parsed.headers.contains_key("Accept"));
        assert!(!parsed.headers.contains_key("Host"));
    }

    #[test]
    fn compression_ratio_reflects_size_reduction() {
        let padding = "x".repeat(4000);
        let raw = format!(
            "POST /api/v2/orders HTTP/1.1\nHost: api.example\n\n{{\"id\": 7, \"blob\": \"{padding}\"}}"
        );
        let parsed = parse(&raw);
        assert_eq!(parsed.original_size, raw.len());
        assert!(parsed.compressed_size < parsed.original_size);
        assert!(parsed.compression_ratio > 0.9);
        assert!(parsed.compression_ratio < 1.0);
    }

    #[test]
    fn empty_input_does_not_divide_by_zero() {
        let parsed = parse("");
        assert_eq!(parsed.original_size, 0);
        assert_eq!(parsed.compression_ratio, 0.0);
        assert_eq!(parsed.category, Category::Unknown);
        assert_eq!(parsed.method, "GET");
    }

    #[test]
    fn domain_comes_from_host_header() {
        let parsed = parse("GET / HTTP/1.1\nhost: lower.example\n\n");
        assert_eq!(parsed.domain.as_deref(), Some("lower.example"));
    }

    #[test]
    fn query_params_are_captured() {
        let parsed = parse("GET /search?q=admin&page=2 HTTP/1.1\n\n");
        assert_eq!(parsed.params.get("q").map(String::as_str), Some("admin"));
        assert_eq!(parsed.params.get("page").map(String::as_str), Some("2"));
        assert_eq!(parsed.endpoint, "/search");
    }
}
