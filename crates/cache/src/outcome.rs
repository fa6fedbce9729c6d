//! Cache lookup results and usage statistics.

use serde::Serialize;

/// Which tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// L1: exact content-hash match.
    Exact,
    /// L2: embedding similarity above threshold.
    Similarity,
    /// L3: known-pattern context, no stored analysis.
    Pattern,
    /// No tier applied.
    Miss,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Exact => "L1",
            CacheTier::Similarity => "L2",
            CacheTier::Pattern => "L3",
            CacheTier::Miss => "MISS",
        }
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model cost implied by a lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCost {
    /// No model call needed.
    Free,
    /// Only an embedding call was spent.
    Minimal,
    /// A model call with a shortened prompt.
    Reduced,
    /// A full model call with complete context.
    Full,
}

impl CacheCost {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCost::Free => "free",
            CacheCost::Minimal => "minimal",
            CacheCost::Reduced => "reduced",
            CacheCost::Full => "full",
        }
    }
}

/// Result of one tiered lookup.
///
/// Exactly one of `analysis` (L1/L2) or `context` (L3) is set on a hit;
/// both are `None` on a miss.
#[derive(Debug, Clone, Serialize)]
pub struct CacheOutcome {
    pub tier: CacheTier,
    pub cost: CacheCost,

    /// How much to trust the result: 1.0 exact, measured similarity for L2,
    /// a fixed configurable value for L3.
    pub confidence: f64,

    /// Stored analysis text, served verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    /// Enriched pattern context for the prompt assembler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Embedding computed during the lookup, handed back so the caller
    /// never has to re-bill the embedding service for the same request.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl CacheOutcome {
    pub fn exact(analysis: String) -> Self {
        Self {
            tier: CacheTier::Exact,
            cost: CacheCost::Free,
            confidence: 1.0,
            analysis: Some(analysis),
            context: None,
            embedding: None,
        }
    }

    pub fn similar(analysis: String, similarity: f64) -> Self {
        Self {
            tier: CacheTier::Similarity,
            cost: CacheCost::Minimal,
            confidence: similarity,
            analysis: Some(analysis),
            context: None,
            embedding: None,
        }
    }

    pub fn pattern(context: String, confidence: f64) -> Self {
        Self {
            tier: CacheTier::Pattern,
            cost: CacheCost::Reduced,
            confidence,
            analysis: None,
            context: Some(context),
            embedding: None,
        }
    }

    pub fn miss() -> Self {
        Self {
            tier: CacheTier::Miss,
            cost: CacheCost::Full,
            confidence: 0.0,
            analysis: None,
            context: None,
            embedding: None,
        }
    }

    pub fn carrying(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn is_hit(&self) -> bool {
        self.tier != CacheTier::Miss
    }

    /// True when the outcome carries a final analysis (L1/L2).
    pub fn is_final(&self) -> bool {
        self.analysis.is_some()
    }
}

/// Aggregated counters for one stored cache level.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    pub level: u8,
    pub entries: u64,
    pub hits: i64,
    pub tokens_saved: i64,
}

/// Project-wide cache usage summary.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tiers: Vec<TierStats>,
    pub total_entries: u64,
    pub total_hits: i64,
    pub total_tokens_saved: i64,

    /// `total_tokens_saved × price_per_token`, in USD.
    pub estimated_cost_saved: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_names() {
        assert_eq!(CacheTier::Exact.as_str(), "L1");
        assert_eq!(CacheTier::Similarity.as_str(), "L2");
        assert_eq!(CacheTier::Pattern.as_str(), "L3");
        assert_eq!(CacheTier::Miss.as_str(), "MISS");
    }

    #[test]
    fn exact_outcome_is_free_and_certain() {
        let outcome = CacheOutcome::exact("stored analysis".into());
        assert_eq!(outcome.tier, CacheTier::Exact);
        assert_eq!(outcome.cost, CacheCost::Free);
        assert_eq!(outcome.confidence, 1.0);
        assert!(outcome.is_hit());
        assert!(outcome.is_final());
    }

    #[test]
    fn pattern_outcome_carries_context_not_analysis() {
        let outcome = CacheOutcome::pattern("known patterns".into(), 0.85);
        assert!(outcome.analysis.is_none());
        assert_eq!(outcome.context.as_deref(), Some("known patterns"));
        assert!(outcome.is_hit());
        assert!(!outcome.is_final());
    }

    #[test]
    fn miss_has_full_cost() {
        let outcome = CacheOutcome::miss();
        assert_eq!(outcome.cost, CacheCost::Full);
        assert!(!outcome.is_hit());
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let json = serde_json::to_string(&CacheOutcome::miss()).unwrap();
        assert!(!json.contains("analysis"));
        assert!(!json.contains("context"));
        assert!(json.contains("\"tier\":\"miss\""));
    }
}
