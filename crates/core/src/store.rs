//! Store trait — the repository abstraction over all durable state.
//!
//! The store is the sole shared mutable resource in the system. Correctness
//! under concurrent analyses depends on the two named atomic operations:
//! counter increments (`increment_project_stat`, `observe_pattern`,
//! `increment_cache_hit`) and clamped confidence deltas
//! (`adjust_pattern_confidence`). Backends must implement these without
//! read-modify-write races; everything else is plain keyed access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{
    CacheEntry, CompressedRequestRecord, LearningLoop, PatternKind, PatternRecord, ProjectRecord,
    SuccessMemory,
};
use crate::request::Category;

/// A numeric project aggregate moved only by atomic increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStat {
    RequestsAnalyzed,
    TokensSaved,
    SuccessCount,
    FailureCount,
    PartialCount,
}

impl ProjectStat {
    /// Column name in SQL backends.
    pub fn column(&self) -> &'static str {
        match self {
            ProjectStat::RequestsAnalyzed => "requests_analyzed",
            ProjectStat::TokensSaved => "tokens_saved",
            ProjectStat::SuccessCount => "success_count",
            ProjectStat::FailureCount => "failure_count",
            ProjectStat::PartialCount => "partial_count",
        }
    }
}

/// A similarity hit against stored cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMatch {
    pub request_hash: String,
    pub analysis: String,
    pub similarity: f64,
}

/// A similarity hit against the compressed-request corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRequest {
    pub endpoint: String,
    pub method: String,
    pub category: Category,
    pub digest: String,
    pub similarity: f64,
}

/// The repository trait all backends implement.
///
/// Implementations: SQLite (durable), in-memory (tests and offline use).
#[async_trait]
pub trait Store: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    // --- Projects ---

    async fn get_project(&self, project_id: &str)
    -> std::result::Result<Option<ProjectRecord>, StoreError>;

    async fn create_project(&self, project: ProjectRecord)
    -> std::result::Result<(), StoreError>;

    /// Atomically add `delta` to one aggregate counter.
    async fn increment_project_stat(
        &self,
        project_id: &str,
        stat: ProjectStat,
        delta: i64,
    ) -> std::result::Result<(), StoreError>;

    /// Replace the memory fields (notes, learned patterns, exploits).
    ///
    /// Bounding (5000-character notes, 50 exploits) is the caller's
    /// responsibility; the store writes what it is given.
    async fn save_project_memory(
        &self,
        project_id: &str,
        notes: &str,
        learned_patterns: &[String],
        success_exploits: &[String],
    ) -> std::result::Result<(), StoreError>;

    // --- Cache entries ---

    async fn get_cache_entry(
        &self,
        project_id: &str,
        request_hash: &str,
        level: u8,
    ) -> std::result::Result<Option<CacheEntry>, StoreError>;

    /// Insert or refresh an entry. On conflict the analysis text, embedding,
    /// and expiry are replaced; `hit_count` and `tokens_saved` are preserved.
    async fn upsert_cache_entry(&self, entry: CacheEntry)
    -> std::result::Result<(), StoreError>;

    /// Atomically bump `hit_count` by one and `tokens_saved` by the given
    /// estimate.
    async fn increment_cache_hit(
        &self,
        project_id: &str,
        request_hash: &str,
        tokens_saved_delta: i64,
    ) -> std::result::Result<(), StoreError>;

    /// Remove entries whose expiry is before `now`; returns how many.
    async fn delete_expired_entries(
        &self,
        now: DateTime<Utc>,
    ) -> std::result::Result<u64, StoreError>;

    /// All entries for a project, counters included, for stats aggregation.
    async fn cache_entries(
        &self,
        project_id: &str,
    ) -> std::result::Result<Vec<CacheEntry>, StoreError>;

    /// Top-K cache entries whose embedding similarity to `embedding`
    /// exceeds `threshold`, best first.
    async fn similar_cache_entries(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> std::result::Result<Vec<CachedMatch>, StoreError>;

    // --- Compressed requests ---

    async fn record_compressed_request(
        &self,
        record: CompressedRequestRecord,
    ) -> std::result::Result<(), StoreError>;

    /// Most recent stored embedding for (project, endpoint, method), so
    /// repeated probing of one endpoint does not re-bill embeddings.
    async fn find_request_embedding(
        &self,
        project_id: &str,
        endpoint: &str,
        method: &str,
    ) -> std::result::Result<Option<Vec<f32>>, StoreError>;

    /// Top-K similar past requests above `threshold`, best first.
    async fn similar_requests(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> std::result::Result<Vec<SimilarRequest>, StoreError>;

    // --- Patterns ---

    /// Create-or-increment in one atomic step: new records start at
    /// `times_seen = 1` with `initial_confidence`; existing records get
    /// `times_seen + 1` and a fresh `last_seen`, confidence untouched.
    async fn observe_pattern(
        &self,
        project_id: &str,
        category: Category,
        name: &str,
        kind: PatternKind,
        initial_confidence: f64,
    ) -> std::result::Result<(), StoreError>;

    /// Pattern records for (project, category) whose name is in `names`.
    async fn patterns_by_names(
        &self,
        project_id: &str,
        category: Category,
        names: &[String],
        limit: usize,
    ) -> std::result::Result<Vec<PatternRecord>, StoreError>;

    /// Highest-`times_seen` records above a confidence floor.
    async fn top_patterns(
        &self,
        project_id: &str,
        min_confidence: f64,
        limit: usize,
    ) -> std::result::Result<Vec<PatternRecord>, StoreError>;

    /// Atomically apply a signed confidence delta, clamped to [0, 1].
    async fn adjust_pattern_confidence(
        &self,
        project_id: &str,
        name: &str,
        delta: f64,
    ) -> std::result::Result<(), StoreError>;

    /// Keep only the `keep` highest-`times_seen` patterns; returns how many
    /// were deleted.
    async fn prune_patterns(
        &self,
        project_id: &str,
        keep: usize,
    ) -> std::result::Result<u64, StoreError>;

    // --- Success memories ---

    /// Upsert by (project, key); on conflict content and `updated_at` are
    /// replaced.
    async fn upsert_success_memory(
        &self,
        memory: SuccessMemory,
    ) -> std::result::Result<(), StoreError>;

    /// Most recently updated first.
    async fn recent_success_memories(
        &self,
        project_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SuccessMemory>, StoreError>;

    /// Keep only the `keep` most recently updated; returns how many were
    /// deleted.
    async fn prune_success_memories(
        &self,
        project_id: &str,
        keep: usize,
    ) -> std::result::Result<u64, StoreError>;

    // --- Learning loops ---

    async fn record_learning_loop(
        &self,
        entry: LearningLoop,
    ) -> std::result::Result<(), StoreError>;

    /// Most recent first.
    async fn recent_learning_loops(
        &self,
        project_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<LearningLoop>, StoreError>;
}
