//! Ordered first-match category classification.
//!
//! The table order is a hard contract, not an optimization: AUTH is tested
//! before PAYMENT, so a request matching both classifies as AUTH. Changing
//! the order changes cache keys and pattern statistics downstream.

use once_cell::sync::Lazy;
use redtalon_core::Category;
use regex::Regex;

static CATEGORY_PATTERNS: Lazy<Vec<(Category, Regex)>> = Lazy::new(|| {
    let table = [
        (
            Category::Auth,
            r"(?i)login|auth|signin|signup|oauth|sso|password|token|session|jwt",
        ),
        (
            Category::Payment,
            r"(?i)payment|checkout|cart|order|price|amount|billing|invoice|subscription",
        ),
        (
            Category::Refund,
            r"(?i)refund|cancel|return|chargeback|dispute|reversal",
        ),
        (Category::Api, r"(?i)api|rest|graphql|rpc|webhook|callback"),
        (
            Category::Profile,
            r"(?i)user|profile|account|settings|preferences|dashboard",
        ),
        (
            Category::Workflow,
            r"(?i)step|process|flow|wizard|onboarding|validation",
        ),
        (
            Category::Admin,
            r"(?i)admin|manage|moderate|control|config|system",
        ),
        (
            Category::Search,
            r"(?i)search|query|filter|find|lookup|autocomplete",
        ),
    ];
    table
        .into_iter()
        .map(|(cat, pattern)| (cat, Regex::new(pattern).expect("valid category regex")))
        .collect()
});

/// Classify by testing the full path plus raw body text, first match wins.
pub fn classify(full_path: &str, body_text: &str) -> Category {
    let haystack = format!("{full_path} {body_text}");
    for (category, pattern) in CATEGORY_PATTERNS.iter() {
        if pattern.is_match(&haystack) {
            return *category;
        }
    }
    Category::Unknown
}
