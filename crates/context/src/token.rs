//! Token estimation.

/// Rough token count: `⌈chars / chars_per_token⌉`.
///
/// An approximation, not a tokenizer — it exists so prompt budgets and
/// savings estimates use one consistent rule.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    let ratio = chars_per_token.max(1);
    text.chars().count().div_ceil(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens("abcd", 4), 1);
        assert_eq!(estimate_tokens("abcde", 4), 2);
        assert_eq!(estimate_tokens("", 4), 0);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // four 2-byte characters are still four characters
        assert_eq!(estimate_tokens("éééé", 4), 1);
    }

    #[test]
    fn zero_ratio_does_not_panic() {
        assert_eq!(estimate_tokens("abcd", 0), 4);
    }
}
