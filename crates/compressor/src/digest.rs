//! The fixed-layout context digest.
//!
//! Six lines, always in the same order, so the same parsed request always
//! embeds to the same vector and renders the same prompt fragment.

use redtalon_core::ParsedRequest;

const CRITICAL_PREVIEW_CHARS: usize = 200;
const TOP_VECTORS: usize = 3;

/// Compress a parsed request into the multi-line digest used both as
/// embedding input and as a compact context fragment.
pub fn compress_for_context(parsed: &ParsedRequest) -> String {
    let critical = truncate_chars(&parsed.critical.serialized(), CRITICAL_PREVIEW_CHARS);
    let top_vectors: Vec<&str> = parsed
        .attack_vectors
        .iter()
        .take(TOP_VECTORS)
        .map(String::as_str)
        .collect();

    format!(
        "{} {}\nDomain: {}\nCategory: {}\nPatterns: {}\nCritical: {}\nVectors: {}",
        parsed.method,
        parsed.endpoint,
        parsed.domain.as_deref().unwrap_or(""),
        parsed.category,
        parsed.patterns.join(", "),
        critical,
        top_vectors.join(", "),
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn digest_has_fixed_layout() {
        let parsed = parse("GET /api/payment/process?amount=-1 HTTP/1.1\nHost: example.com\n\n");
        let digest = compress_for_context(&parsed);
        let lines: Vec<&str> = digest.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "GET /api/payment/process");
        assert_eq!(lines[1], "Domain: example.com");
        assert_eq!(lines[2], "Category: PAYMENT");
        assert!(lines[3].starts_with("Patterns: "));
        assert!(lines[4].starts_with("Critical: "));
        assert!(lines[5].starts_with("Vectors: "));
    }

    #[test]
    fn digest_is_deterministic() {
        let raw = "POST /checkout HTTP/1.1\nHost: shop.example\n\n{\"amount\": 10}";
        let a = compress_for_context(&parse(raw));
        let b = compress_for_context(&parse(raw));
        assert_eq!(a, b);
    }

    #[test]
    fn critical_preview_is_bounded() {
        let big_field = "x".repeat(2000);
        let raw = format!("POST /checkout HTTP/1.1\n\n{{\"amount\": \"{big_field}\"}}");
        let digest = compress_for_context(&parse(&raw));
        let critical_line = digest
            .lines()
            .find(|l| l.starts_with("Critical: "))
            .unwrap();
        assert!(critical_line.chars().count() <= "Critical: ".len() + 200);
    }

    #[test]
    fn at_most_three_vectors_listed() {
        let parsed = parse("POST /login HTTP/1.1\n\n{\"token\":\"eyJx\"}");
        let digest = compress_for_context(&parsed);
        let vectors_line = digest.lines().last().unwrap();
        let count = vectors_line
            .trim_start_matches("Vectors: ")
            .split(", ")
            .count();
        assert!(count <= 3);
    }
}
