//! Follow-up test suggestions after feedback.
//!
//! Selection is a pure function of the seed bytes (the request hash when
//! the feedback carries one), so identical feedback always yields the same
//! suggestion. The templates are heuristics, not model output.

use redtalon_core::{Outcome, TestResult};

/// What to try next after a confirmed exploit.
fn next_step_pool(test: &str) -> [String; 4] {
    [
        format!("Escalate \"{test}\": push the same field to extreme values (MAX_INT, -1, 0.001)"),
        format!("Automate \"{test}\" to confirm it reproduces reliably before reporting"),
        "Probe adjacent endpoints for the same weakness".to_string(),
        "Chain this with a second confirmed pattern on the same flow".to_string(),
    ]
}

/// What to try instead after a failed attempt.
fn alternative_pool(test: &str) -> [String; 4] {
    [
        format!("\"{test}\" did not land; retry with a different HTTP method"),
        "Replay the request with a stale or expired token".to_string(),
        "Mutate the content type (JSON vs form-encoded) and resubmit".to_string(),
        "Race duplicate submissions of the same request".to_string(),
    ]
}

/// FNV-1a over the seed bytes.
fn fold_seed(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Pick the follow-up suggestion for one feedback event.
///
/// Successes get a next-step suggestion, failures an alternative; partial
/// and inconclusive results get none — there is nothing definite to build
/// on yet.
pub fn next_tests(result: &TestResult) -> Vec<String> {
    let seed_material = result
        .request_hash
        .as_deref()
        .unwrap_or(&result.test_performed);
    let seed = fold_seed(seed_material.as_bytes());

    let pool = match result.outcome {
        Outcome::Success => next_step_pool(&result.test_performed),
        Outcome::Failure => alternative_pool(&result.test_performed),
        Outcome::Partial | Outcome::Inconclusive => return Vec::new(),
    };

    let index = (seed % pool.len() as u64) as usize;
    vec![pool[index].clone()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use redtalon_core::Category;

    fn result(outcome: Outcome, hash: Option<&str>) -> TestResult {
        TestResult {
            project_id: "proj_1".into(),
            request_hash: hash.map(str::to_owned),
            endpoint: "/api/checkout".into(),
            category: Category::Payment,
            test_performed: "pay -1".into(),
            outcome,
            notes: None,
            patterns: Vec::new(),
            discovered_pattern: None,
        }
    }

    #[test]
    fn identical_feedback_yields_identical_suggestion() {
        let a = next_tests(&result(Outcome::Success, Some("abc123")));
        let b = next_tests(&result(Outcome::Success, Some("abc123")));
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn different_hashes_can_select_different_templates() {
        let picks: std::collections::HashSet<String> = ["h1", "h2", "h3", "h4", "h5", "h6", "h7"]
            .iter()
            .flat_map(|h| next_tests(&result(Outcome::Success, Some(h))))
            .collect();
        assert!(picks.len() > 1, "seed should vary the selection");
    }

    #[test]
    fn success_draws_from_the_next_step_pool() {
        let suggestion = &next_tests(&result(Outcome::Success, Some("seed")))[0];
        assert!(next_step_pool("pay -1").contains(suggestion));
    }

    #[test]
    fn failure_draws_from_the_alternative_pool() {
        let suggestion = &next_tests(&result(Outcome::Failure, Some("seed")))[0];
        assert!(alternative_pool("pay -1").contains(suggestion));
    }

    #[test]
    fn partial_and_inconclusive_get_no_suggestion() {
        assert!(next_tests(&result(Outcome::Partial, Some("seed"))).is_empty());
        assert!(next_tests(&result(Outcome::Inconclusive, Some("seed"))).is_empty());
    }

    #[test]
    fn missing_hash_falls_back_to_the_test_text() {
        let a = next_tests(&result(Outcome::Failure, None));
        let b = next_tests(&result(Outcome::Failure, None));
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }
}
