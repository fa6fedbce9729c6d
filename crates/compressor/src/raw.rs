//! Best-effort splitting of raw captured HTTP text.
//!
//! This is deliberately not an RFC-grade parser: captured requests arrive
//! as pasted text, often mangled, and nothing here is allowed to fail.
//! Missing pieces fall back to defaults (`GET`, `/`, empty maps).

use std::collections::BTreeMap;

use serde_json::Value;

/// Intermediate split of a raw request, before classification.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: String,
    /// Path without the query string.
    pub endpoint: String,
    /// Path including the query string, as written.
    pub full_path: String,
    pub params: BTreeMap<String, String>,
    /// All headers, keys as sent.
    pub headers: BTreeMap<String, String>,
    /// Structured body: JSON value, form-pair object, `{"raw": …}`, or Null.
    pub body: Value,
    /// Raw body text, used for classification.
    pub body_text: String,
}

impl RawRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// String field from the body object, if present.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Arbitrary field from the body object, if present.
    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Split raw request text into its parts. Never fails.
pub fn split_raw(raw: &str) -> RawRequest {
    let mut lines = raw.lines();
    let first_line = lines.next().unwrap_or("");

    let mut tokens = first_line.split_whitespace();
    let method = match tokens.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "GET".to_string(),
    };
    let full_path = tokens.next().unwrap_or("/").to_string();

    let (endpoint, params) = parse_path(&full_path);
    let headers = parse_headers(raw);
    let body_text = body_text(raw);
    let body = parse_body(&body_text);

    RawRequest {
        method,
        endpoint,
        full_path,
        params,
        headers,
        body,
        body_text,
    }
}

/// Split the path from its query string and decode the parameters.
fn parse_path(full_path: &str) -> (String, BTreeMap<String, String>) {
    let (path, query) = match full_path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (full_path, ""),
    };

    let path = if path.is_empty() { "/" } else { path };

    let mut params = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if !key.is_empty() {
            params.insert(key.to_string(), decode_component(value));
        }
    }

    (path.to_string(), params)
}

/// Headers sit between the request line and the first blank line; each
/// splits at its first `:`. Lines without a colon are skipped.
fn parse_headers(raw: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for line in raw.lines().skip(1) {
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                headers.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    headers
}

/// Everything after the first blank line; empty when there is none.
fn body_text(raw: &str) -> String {
    let mut seen_blank = false;
    let mut body_lines = Vec::new();
    for line in raw.lines().skip(1) {
        if seen_blank {
            body_lines.push(line);
        } else if line.trim().is_empty() {
            seen_blank = true;
        }
    }
    body_lines.join("\n")
}

/// JSON first, then form pairs, else an opaque `{"raw": …}` wrapper.
fn parse_body(body_text: &str) -> Value {
    let trimmed = body_text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    // Form-encoded only when every segment looks like key=value.
    let segments: Vec<&str> = trimmed.split('&').collect();
    if segments.iter().all(|s| s.contains('=')) {
        let mut form = serde_json::Map::new();
        for segment in segments {
            if let Some((key, value)) = segment.split_once('=') {
                if !key.is_empty() {
                    form.insert(key.to_string(), Value::String(decode_component(value)));
                }
            }
        }
        if !form.is_empty() {
            return Value::Object(form);
        }
    }

    serde_json::json!({ "raw": trimmed })
}

/// Best-effort percent decoding; invalid escapes pass through verbatim.
fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = (
                    bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                    bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
                );
                if let (Some(h), Some(l)) = hex {
                    out.push((h * 16 + l) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_request_line_headers_and_body() {
        let raw = "POST /checkout HTTP/1.1\nHost: shop.example\nContent-Type: application/json\n\n{\"amount\": 10}";
        let req = split_raw(raw);
        assert_eq!(req.method, "POST");
        assert_eq!(req.endpoint, "/checkout");
        assert_eq!(req.header("host"), Some("shop.example"));
        assert_eq!(req.body["amount"], 10);
    }

    #[test]
    fn empty_input_yields_defaults() {
        let req = split_raw("");
        assert_eq!(req.method, "GET");
        assert_eq!(req.endpoint, "/");
        assert!(req.params.is_empty());
        assert!(req.headers.is_empty());
        assert!(req.body.is_null());
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let req = split_raw("POST");
        assert_eq!(req.method, "POST");
        assert_eq!(req.endpoint, "/");
    }

    #[test]
    fn query_params_are_decoded() {
        let req = split_raw("GET /search?q=a%20b&lang=fr+ca HTTP/1.1\n\n");
        assert_eq!(req.param("q"), Some("a b"));
        assert_eq!(req.param("lang"), Some("fr ca"));
    }

    #[test]
    fn negative_amount_param_survives() {
        let req = split_raw("GET /api/payment/process?amount=-1 HTTP/1.1\nHost: example.com\n\n");
        assert_eq!(req.param("amount"), Some("-1"));
        assert_eq!(req.endpoint, "/api/payment/process");
    }

    #[test]
    fn form_body_parses_to_pairs() {
        let req = split_raw("POST /login HTTP/1.1\n\nuser=alice&pass=s3cret");
        assert_eq!(req.body_str("user"), Some("alice"));
        assert_eq!(req.body_str("pass"), Some("s3cret"));
    }

    #[test]
    fn opaque_body_is_wrapped_raw() {
        let req = split_raw("POST /upload HTTP/1.1\n\nsome plain text");
        assert_eq!(req.body_str("raw"), Some("some plain text"));
    }

    #[test]
    fn no_blank_line_means_no_body() {
        let req = split_raw("GET / HTTP/1.1\nHost: a.example");
        assert!(req.body.is_null());
        assert_eq!(req.body_text, "");
    }

    #[test]
    fn header_without_colon_is_skipped() {
        let req = split_raw("GET / HTTP/1.1\ngarbage line\nHost: ok.example\n\n");
        assert_eq!(req.header("Host"), Some("ok.example"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn invalid_percent_escape_passes_through() {
        let req = split_raw("GET /x?v=%zz HTTP/1.1\n\n");
        assert_eq!(req.param("v"), Some("%zz"));
    }
}
