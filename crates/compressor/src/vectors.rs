//! Attack-vector derivation: a static catalog per category, extended by
//! pattern-triggered additions.

use redtalon_core::Category;

/// Candidate vectors worth testing for each category, strongest first.
fn category_vectors(category: Category) -> &'static [&'static str] {
    match category {
        Category::Auth => &[
            "multi-provider-bypass",
            "token-manipulation",
            "session-hijacking",
            "oauth-redirect",
            "password-reset-bypass",
            "jwt-algorithm-confusion",
            "race-condition-login",
        ],
        Category::Payment => &[
            "price-manipulation",
            "negative-amounts",
            "currency-confusion",
            "double-spending",
            "coupon-stacking",
            "race-condition-checkout",
            "payment-method-bypass",
        ],
        Category::Refund => &[
            "negative-refund",
            "double-refund",
            "refund-without-purchase",
            "partial-refund-abuse",
            "timing-attack",
        ],
        Category::Api => &[
            "rate-limit-bypass",
            "graphql-introspection",
            "batch-query-abuse",
            "parameter-pollution",
            "method-override",
        ],
        Category::Profile => &[
            "privilege-escalation",
            "data-exposure",
            "account-takeover",
            "profile-pollution",
        ],
        Category::Workflow => &[
            "step-bypass",
            "state-manipulation",
            "workflow-reversal",
            "validation-skip",
        ],
        Category::Admin => &[
            "admin-panel-access",
            "config-exposure",
            "privilege-escalation",
            "command-injection",
        ],
        Category::Search => &[
            "sql-injection",
            "nosql-injection",
            "ldap-injection",
            "search-pollution",
        ],
        Category::Unknown => &["general-manipulation"],
    }
}

/// Extra vector implied by a detected pattern, if any.
fn pattern_vector(pattern: &str) -> Option<&'static str> {
    match pattern {
        "negative-value" => Some("negative-value-exploitation"),
        "multi-provider" => Some("provider-confusion-attack"),
        "jwt-token" => Some("jwt-manipulation"),
        _ => None,
    }
}

/// Category catalog plus pattern-triggered additions, deduplicated in
/// derivation order.
pub fn derive(category: Category, patterns: &[String]) -> Vec<String> {
    let mut vectors: Vec<String> = category_vectors(category)
        .iter()
        .map(|v| v.to_string())
        .collect();

    for pattern in patterns {
        if let Some(extra) = pattern_vector(pattern) {
            if !vectors.iter().any(|v| v == extra) {
                vectors.push(extra.to_string());
            }
        }
    }

    vectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_catalog_leads_with_price_manipulation() {
        let vectors = derive(Category::Payment, &[]);
        assert_eq!(vectors[0], "price-manipulation");
    }

    #[test]
    fn negative_value_adds_exploitation_vector() {
        let vectors = derive(Category::Payment, &["negative-value".to_string()]);
        assert!(vectors.contains(&"price-manipulation".to_string()));
        assert!(vectors.contains(&"negative-value-exploitation".to_string()));
    }

    #[test]
    fn unknown_category_still_has_a_vector() {
        let vectors = derive(Category::Unknown, &[]);
        assert_eq!(vectors, vec!["general-manipulation"]);
    }

    #[test]
    fn no_duplicate_vectors() {
        let vectors = derive(
            Category::Auth,
            &["jwt-token".to_string(), "jwt-token".to_string()],
        );
        let mut sorted = vectors.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), vectors.len());
    }
}
