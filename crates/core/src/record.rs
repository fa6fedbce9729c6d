//! Durable records — everything the store persists between analyses.
//!
//! All cross-request state lives here: cached analyses, pattern statistics,
//! success memories, learning loops, and per-project aggregates. These are
//! plain serde records; persistence schema is owned by the store backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::Category;

/// A cached analysis, scoped to (project, request hash).
///
/// Created on first store; mutated by every subsequent hit. Counter fields
/// only ever grow — refreshing the analysis text must never reset them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub project_id: String,

    /// Content hash of the originating raw request.
    pub request_hash: String,

    /// Cache tier this entry serves: 1 (exact), 2 (similarity), 3 (pattern).
    pub cache_level: u8,

    /// Stored analysis text; present for levels 1–2 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_analysis: Option<String>,

    /// Digest embedding used for similarity lookups (stored as blob in DB).
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// Times this entry satisfied a lookup.
    pub hit_count: i64,

    /// Estimated tokens saved by serving this entry instead of the model.
    pub tokens_saved: i64,

    /// Entries past this instant are removed by the expiry sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A fresh exact-match (level 1) entry with zeroed counters.
    pub fn exact(
        project_id: impl Into<String>,
        request_hash: impl Into<String>,
        analysis: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            request_hash: request_hash.into(),
            cache_level: 1,
            cached_analysis: Some(analysis.into()),
            embedding: None,
            hit_count: 0,
            tokens_saved: 0,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a digest embedding (builder style).
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set an expiry instant (builder style).
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// How a pattern record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Detected automatically by the compressor.
    Observed,
    /// Reported by the tester through feedback.
    Discovered,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Observed => "observed",
            PatternKind::Discovered => "discovered",
        }
    }

    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("discovered") {
            PatternKind::Discovered
        } else {
            PatternKind::Observed
        }
    }
}

/// Statistics for one recurring pattern within a project.
///
/// Keyed by (project, category, name). `times_seen` is monotonic;
/// `confidence` moves only by explicit signed deltas from feedback,
/// clamped to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    pub project_id: String,
    pub category: Category,
    pub name: String,
    pub kind: PatternKind,

    /// How much past feedback supports this pattern, in [0, 1].
    pub confidence: f64,

    /// Total observations; never decreases.
    pub times_seen: i64,

    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Long-lived record of a successful exploit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessMemory {
    pub id: String,
    pub project_id: String,

    /// Upsert key, generated from the feedback timestamp.
    pub key: String,

    pub endpoint: String,
    pub technique: String,
    pub result: String,
    pub confidence: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SuccessMemory {
    pub fn new(
        project_id: impl Into<String>,
        key: impl Into<String>,
        endpoint: impl Into<String>,
        technique: impl Into<String>,
        result: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            key: key.into(),
            endpoint: endpoint.into(),
            technique: technique.into(),
            result: result.into(),
            confidence,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of one attempted test, as reported by the tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
    Inconclusive,
}

impl Outcome {
    /// Confidence weight recorded with the learning loop.
    pub fn confidence(&self) -> f64 {
        match self {
            Outcome::Success => 0.9,
            Outcome::Partial => 0.5,
            Outcome::Failure => 0.2,
            Outcome::Inconclusive => 0.3,
        }
    }

    /// Signed delta applied to each involved pattern's confidence.
    pub fn pattern_delta(&self) -> f64 {
        match self {
            Outcome::Success => 0.10,
            Outcome::Partial => 0.05,
            Outcome::Failure => -0.05,
            Outcome::Inconclusive => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
            Outcome::Inconclusive => "inconclusive",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "success" => Outcome::Success,
            "partial" => Outcome::Partial,
            "failure" => Outcome::Failure,
            _ => Outcome::Inconclusive,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded test attempt — the unit of the learning history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningLoop {
    pub id: String,
    pub project_id: String,

    /// Hash of the analyzed request, when the test came from an analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,

    pub endpoint: String,
    pub category: Category,

    /// What the tester actually tried.
    pub test_performed: String,

    pub outcome: Outcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Confidence weight derived from the outcome.
    pub confidence: f64,

    pub created_at: DateTime<Utc>,
}

/// A tester-submitted feedback event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,

    pub endpoint: String,
    pub category: Category,
    pub test_performed: String,
    pub outcome: Outcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Patterns detected on the originating request, for confidence updates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,

    /// A new pattern the tester identified manually, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_pattern: Option<String>,
}

/// Per-project descriptor and aggregates.
///
/// The free-text notes, learned-pattern list, and exploit list form the
/// project memory folded into prompts; the counters are only ever moved by
/// atomic increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Free-text analysis notes, bounded to 5000 characters.
    #[serde(default)]
    pub ai_context_notes: String,

    /// Deduplicated names of patterns confirmed by feedback.
    #[serde(default)]
    pub learned_patterns: Vec<String>,

    /// Short descriptions of successful exploits, most recent last.
    #[serde(default)]
    pub success_exploits: Vec<String>,

    pub requests_analyzed: i64,
    pub tokens_saved: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub partial_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            domain: None,
            ai_context_notes: String::new(),
            learned_patterns: Vec::new(),
            success_exploits: Vec::new(),
            requests_analyzed: 0,
            tokens_saved: 0,
            success_count: 0,
            failure_count: 0,
            partial_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable record of one analyzed request — the similarity-search corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedRequestRecord {
    pub project_id: String,
    pub request_hash: String,
    pub endpoint: String,
    pub method: String,
    pub category: Category,

    /// The fixed-layout digest produced by the compressor.
    pub digest: String,

    /// Digest embedding (stored as blob in DB).
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    pub original_size: i64,
    pub compressed_size: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_entry_starts_with_zeroed_counters() {
        let entry = CacheEntry::exact("proj_1", "abc123", "analysis text");
        assert_eq!(entry.cache_level, 1);
        assert_eq!(entry.hit_count, 0);
        assert_eq!(entry.tokens_saved, 0);
        assert_eq!(entry.cached_analysis.as_deref(), Some("analysis text"));
        assert!(entry.embedding.is_none());
    }

    #[test]
    fn outcome_confidence_mapping() {
        assert_eq!(Outcome::Success.confidence(), 0.9);
        assert_eq!(Outcome::Partial.confidence(), 0.5);
        assert_eq!(Outcome::Failure.confidence(), 0.2);
        assert_eq!(Outcome::Inconclusive.confidence(), 0.3);
    }

    #[test]
    fn outcome_pattern_deltas() {
        assert_eq!(Outcome::Success.pattern_delta(), 0.10);
        assert_eq!(Outcome::Failure.pattern_delta(), -0.05);
        assert_eq!(Outcome::Partial.pattern_delta(), 0.05);
        assert_eq!(Outcome::Inconclusive.pattern_delta(), 0.0);
    }

    #[test]
    fn outcome_parses_leniently() {
        assert_eq!(Outcome::from_name("SUCCESS"), Outcome::Success);
        assert_eq!(Outcome::from_name("weird"), Outcome::Inconclusive);
    }

    #[test]
    fn cache_entry_serialization_skips_embedding() {
        let entry = CacheEntry::exact("p", "h", "a").with_embedding(vec![0.1, 0.2]);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("embedding"));
        assert!(json.contains("request_hash"));
    }
}
