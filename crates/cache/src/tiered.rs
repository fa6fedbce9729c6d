//! Tier evaluation, cache writes, expiry sweep, and usage stats.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use redtalon_config::CacheConfig;
use redtalon_core::{
    CacheEntry, Embedder, ParsedRequest, PatternKind, PatternRecord, ProjectStat, Result, Store,
};
use tracing::{debug, warn};

use crate::outcome::{CacheOutcome, CacheStats, TierStats};

/// Characters of serialized critical data folded into pattern context.
const CRITICAL_CONTEXT_CHARS: usize = 200;

/// Attack vectors folded into pattern context.
const CONTEXT_VECTORS: usize = 5;

/// Three-tier lookup over stored analyses.
///
/// Tiers are evaluated in order and the first applicable one wins: exact
/// content-hash match, then embedding similarity, then known-pattern
/// context. Any store or embedding failure inside a tier is logged and
/// treated as a miss at that tier — a degraded lookup must never abort the
/// analysis that triggered it.
#[derive(Clone)]
pub struct TieredCache {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    config: CacheConfig,
}

impl TieredCache {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, config: CacheConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Evaluate the tiers for one parsed request.
    ///
    /// An embedding computed along the way rides on the returned outcome,
    /// so a caller proceeding to a full analysis can reuse it.
    pub async fn check_cache(&self, project_id: &str, parsed: &ParsedRequest) -> CacheOutcome {
        if let Some(outcome) = self.check_exact(project_id, parsed).await {
            return outcome;
        }

        let embedding = self.request_embedding(project_id, parsed).await;
        if let Some(vector) = embedding.as_deref() {
            if let Some(outcome) = self.check_similar(project_id, parsed, vector).await {
                return outcome;
            }
        }

        if let Some(outcome) = self.check_patterns(project_id, parsed).await {
            return outcome.carrying(embedding);
        }

        debug!(hash = %parsed.hash, "Cache miss at every tier");
        CacheOutcome::miss().carrying(embedding)
    }

    async fn check_exact(&self, project_id: &str, parsed: &ParsedRequest) -> Option<CacheOutcome> {
        match self.store.get_cache_entry(project_id, &parsed.hash, 1).await {
            Ok(Some(entry)) => match entry.cached_analysis {
                Some(analysis) => {
                    self.record_hit(project_id, &parsed.hash).await;
                    debug!(hash = %parsed.hash, "Exact cache hit");
                    Some(CacheOutcome::exact(analysis))
                }
                None => None,
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Exact-match lookup failed; treating as miss");
                None
            }
        }
    }

    async fn check_similar(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
        embedding: &[f32],
    ) -> Option<CacheOutcome> {
        let matches = match self
            .store
            .similar_cache_entries(project_id, embedding, self.config.similarity_threshold, 1)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Similarity lookup failed; treating as miss");
                return None;
            }
        };

        let best = matches.into_iter().next()?;
        self.record_hit(project_id, &best.request_hash).await;
        debug!(
            hash = %parsed.hash,
            matched = %best.request_hash,
            similarity = best.similarity,
            "Similarity cache hit"
        );
        Some(CacheOutcome::similar(best.analysis, best.similarity))
    }

    /// Embedding for the request digest. A stored embedding from a prior
    /// analysis of the same project/endpoint/method is reused, so repeated
    /// probing of one endpoint does not re-bill the embedding service.
    async fn request_embedding(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
    ) -> Option<Vec<f32>> {
        match self
            .store
            .find_request_embedding(project_id, &parsed.endpoint, &parsed.method)
            .await
        {
            Ok(Some(embedding)) => return Some(embedding),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Stored-embedding lookup failed"),
        }

        let digest = redtalon_compressor::compress_for_context(parsed);
        match self.embedder.embed(&digest).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "Embedding failed; skipping similarity tier");
                None
            }
        }
    }

    async fn check_patterns(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
    ) -> Option<CacheOutcome> {
        if parsed.patterns.is_empty() {
            return None;
        }

        let records = match self
            .store
            .patterns_by_names(
                project_id,
                parsed.category,
                &parsed.patterns,
                self.config.pattern_lookup_limit,
            )
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Pattern lookup failed; treating as miss");
                return None;
            }
        };
        if records.is_empty() {
            return None;
        }

        debug!(hash = %parsed.hash, patterns = records.len(), "Pattern-context cache hit");
        Some(CacheOutcome::pattern(
            pattern_context(&records, parsed),
            self.config.pattern_context_confidence,
        ))
    }

    /// Credit a served entry: one hit, plus the fixed per-hit savings
    /// estimate. Failures here must not turn a hit into an error.
    async fn record_hit(&self, project_id: &str, request_hash: &str) {
        if let Err(e) = self
            .store
            .increment_cache_hit(project_id, request_hash, self.config.tokens_saved_per_hit)
            .await
        {
            warn!(error = %e, "Failed to record cache hit");
        }
    }

    /// Store a fresh analysis as an exact-match entry.
    ///
    /// On conflict the analysis text is replaced but hit/token counters are
    /// preserved. Also feeds pattern statistics (one atomic upsert per
    /// detected pattern) and the project aggregates.
    pub async fn store_in_cache(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
        analysis: &str,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let initial_savings =
            (parsed.original_size as f64 * self.config.initial_savings_ratio) as i64;

        let mut entry = CacheEntry::exact(project_id, parsed.hash.as_str(), analysis);
        entry.tokens_saved = initial_savings;
        if let Some(vector) = embedding {
            entry = entry.with_embedding(vector);
        }
        if let Some(hours) = self.config.ttl_hours {
            entry = entry.with_expiry(Utc::now() + Duration::hours(i64::from(hours)));
        }
        self.store.upsert_cache_entry(entry).await?;

        for name in &parsed.patterns {
            self.store
                .observe_pattern(
                    project_id,
                    parsed.category,
                    name,
                    PatternKind::Observed,
                    self.config.observed_pattern_confidence,
                )
                .await?;
        }

        self.store
            .increment_project_stat(project_id, ProjectStat::RequestsAnalyzed, 1)
            .await?;
        if initial_savings > 0 {
            self.store
                .increment_project_stat(project_id, ProjectStat::TokensSaved, initial_savings)
                .await?;
        }

        debug!(hash = %parsed.hash, patterns = parsed.patterns.len(), "Analysis cached");
        Ok(())
    }

    /// Remove entries past their expiry; returns how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired_entries(Utc::now()).await?;
        if removed > 0 {
            debug!(removed, "Expired cache entries removed");
        }
        Ok(removed)
    }

    /// Aggregate stored counters into a usage summary.
    pub async fn stats(&self, project_id: &str) -> Result<CacheStats> {
        let entries = self.store.cache_entries(project_id).await?;

        let mut tiers: BTreeMap<u8, TierStats> = BTreeMap::new();
        for entry in &entries {
            let tier = tiers.entry(entry.cache_level).or_insert_with(|| TierStats {
                level: entry.cache_level,
                ..TierStats::default()
            });
            tier.entries += 1;
            tier.hits += entry.hit_count;
            tier.tokens_saved += entry.tokens_saved;
        }

        let total_hits = tiers.values().map(|t| t.hits).sum::<i64>();
        let total_tokens_saved = tiers.values().map(|t| t.tokens_saved).sum::<i64>();

        Ok(CacheStats {
            tiers: tiers.into_values().collect(),
            total_entries: entries.len() as u64,
            total_hits,
            total_tokens_saved,
            estimated_cost_saved: total_tokens_saved as f64 * self.config.price_per_token,
        })
    }
}

/// Pattern-context block: per-pattern history plus the request's own
/// signals, compact enough to replace the full memory block in a prompt.
fn pattern_context(records: &[PatternRecord], parsed: &ParsedRequest) -> String {
    let mut out = String::from("Known patterns for this request:\n");
    for record in records {
        out.push_str(&format!(
            "- {}: seen {} times, confidence {:.0}%\n",
            record.name,
            record.times_seen,
            record.confidence * 100.0
        ));
    }

    let vectors: Vec<&str> = parsed
        .attack_vectors
        .iter()
        .take(CONTEXT_VECTORS)
        .map(String::as_str)
        .collect();
    if !vectors.is_empty() {
        out.push_str(&format!("Attack vectors: {}\n", vectors.join(", ")));
    }

    out.push_str(&format!(
        "Critical: {}",
        truncate_chars(&parsed.critical.serialized(), CRITICAL_CONTEXT_CHARS)
    ));
    out
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use redtalon_core::{Category, CompressedRequestRecord, ProjectRecord, UpstreamError};
    use redtalon_store::InMemoryStore;

    const PROJECT: &str = "proj_1";

    const PAYMENT_RAW: &str =
        "GET /api/payment/process?amount=-1 HTTP/1.1\nHost: shop.example.com\n\n";
    const PLAIN_RAW: &str = "GET /healthz HTTP/1.1\nHost: shop.example.com\n\n";

    struct MockEmbedder {
        vector: Vec<f32>,
        fail: bool,
        calls: Mutex<u32>,
    }

    impl MockEmbedder {
        fn returning(vector: Vec<f32>) -> Self {
            Self {
                vector,
                fail: false,
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                vector: Vec::new(),
                fail: true,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Embedder for MockEmbedder {
        fn name(&self) -> &str {
            "mock"
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, UpstreamError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(UpstreamError::Network("embedder offline".into()));
            }
            Ok(self.vector.clone())
        }
    }

    async fn harness(
        embedder: MockEmbedder,
        config: CacheConfig,
    ) -> (TieredCache, Arc<InMemoryStore>, Arc<MockEmbedder>) {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_project(ProjectRecord::new(PROJECT, "Shop"))
            .await
            .unwrap();
        let embedder = Arc::new(embedder);
        let cache = TieredCache::new(store.clone(), embedder.clone(), config);
        (cache, store, embedder)
    }

    #[tokio::test]
    async fn exact_hit_is_free_and_counted() {
        let (cache, store, embedder) =
            harness(MockEmbedder::returning(vec![1.0, 0.0]), CacheConfig::default()).await;
        let parsed = redtalon_compressor::parse(PAYMENT_RAW);

        cache
            .store_in_cache(PROJECT, &parsed, "Probe the amount field", None)
            .await
            .unwrap();

        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert_eq!(outcome.tier, crate::CacheTier::Exact);
        assert_eq!(outcome.cost, crate::CacheCost::Free);
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.analysis.as_deref(), Some("Probe the amount field"));
        // exact tier never touches the embedder
        assert_eq!(embedder.calls(), 0);

        let entry = store
            .get_cache_entry(PROJECT, &parsed.hash, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.hit_count, 1);
        assert_eq!(entry.tokens_saved, 100);
    }

    #[tokio::test]
    async fn exact_match_wins_over_similar_entries() {
        let (cache, _store, embedder) =
            harness(MockEmbedder::returning(vec![1.0, 0.0]), CacheConfig::default()).await;
        let other = redtalon_compressor::parse(PAYMENT_RAW);
        let parsed = redtalon_compressor::parse(PLAIN_RAW);

        // A perfectly similar neighbor exists, and so does the exact entry.
        cache
            .store_in_cache(PROJECT, &other, "neighbor analysis", Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        cache
            .store_in_cache(PROJECT, &parsed, "own analysis", None)
            .await
            .unwrap();

        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert_eq!(outcome.tier, crate::CacheTier::Exact);
        assert_eq!(outcome.analysis.as_deref(), Some("own analysis"));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn similarity_hit_serves_neighbor_analysis() {
        let (cache, store, embedder) =
            harness(MockEmbedder::returning(vec![1.0, 0.0]), CacheConfig::default()).await;
        let stored = redtalon_compressor::parse(PAYMENT_RAW);
        let probe = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &stored, "neighbor analysis", Some(vec![1.0, 0.0]))
            .await
            .unwrap();

        let outcome = cache.check_cache(PROJECT, &probe).await;
        assert_eq!(outcome.tier, crate::CacheTier::Similarity);
        assert_eq!(outcome.cost, crate::CacheCost::Minimal);
        assert!(outcome.confidence > 0.99);
        assert_eq!(outcome.analysis.as_deref(), Some("neighbor analysis"));
        assert_eq!(embedder.calls(), 1);

        // the hit lands on the matched entry, not the probe's hash
        let entry = store
            .get_cache_entry(PROJECT, &stored.hash, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.hit_count, 1);
    }

    #[tokio::test]
    async fn stored_request_embedding_is_reused() {
        let (cache, store, embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let stored = redtalon_compressor::parse(PAYMENT_RAW);
        let probe = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &stored, "neighbor analysis", Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .record_compressed_request(CompressedRequestRecord {
                project_id: PROJECT.into(),
                request_hash: "earlier".into(),
                endpoint: probe.endpoint.clone(),
                method: probe.method.clone(),
                category: probe.category,
                digest: "digest".into(),
                embedding: Some(vec![1.0, 0.0]),
                original_size: 10,
                compressed_size: 5,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        // a failing embedder cannot matter when a stored vector exists
        let outcome = cache.check_cache(PROJECT, &probe).await;
        assert_eq!(outcome.tier, crate::CacheTier::Similarity);
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn low_similarity_falls_through_to_miss() {
        let (cache, _store, embedder) =
            harness(MockEmbedder::returning(vec![3.0, 4.0]), CacheConfig::default()).await;
        let stored = redtalon_compressor::parse(PAYMENT_RAW);
        let probe = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &stored, "neighbor analysis", Some(vec![1.0, 0.0]))
            .await
            .unwrap();

        // cos([1,0],[3,4]) = 0.6, well under the 0.95 threshold
        let outcome = cache.check_cache(PROJECT, &probe).await;
        assert_eq!(outcome.tier, crate::CacheTier::Miss);
        assert_eq!(outcome.cost, crate::CacheCost::Full);
        assert_eq!(embedder.calls(), 1);
        // the spent embedding rides along for the caller to reuse
        assert_eq!(outcome.embedding, Some(vec![3.0, 4.0]));
    }

    #[tokio::test]
    async fn embedder_failure_degrades_to_pattern_context() {
        let (cache, store, _embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let parsed = redtalon_compressor::parse(PAYMENT_RAW);

        for _ in 0..3 {
            store
                .observe_pattern(
                    PROJECT,
                    Category::Payment,
                    "negative-value",
                    PatternKind::Observed,
                    0.5,
                )
                .await
                .unwrap();
        }

        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert_eq!(outcome.tier, crate::CacheTier::Pattern);
        assert_eq!(outcome.cost, crate::CacheCost::Reduced);
        assert_eq!(outcome.confidence, 0.85);
        assert!(outcome.analysis.is_none());

        let context = outcome.context.unwrap();
        assert!(context.contains("negative-value: seen 3 times"));
        assert!(context.contains("price-manipulation"));
        assert!(context.contains("Critical:"));
        assert!(outcome.embedding.is_none());
    }

    #[tokio::test]
    async fn unknown_patterns_are_a_miss() {
        let (cache, _store, _embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let parsed = redtalon_compressor::parse(PAYMENT_RAW);

        // patterns were detected but the project has no history for them
        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert_eq!(outcome.tier, crate::CacheTier::Miss);
    }

    #[tokio::test]
    async fn storing_observes_patterns_and_project_stats() {
        let (cache, store, _embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let parsed = redtalon_compressor::parse(PAYMENT_RAW);

        cache
            .store_in_cache(PROJECT, &parsed, "first analysis", None)
            .await
            .unwrap();
        cache
            .store_in_cache(PROJECT, &parsed, "second analysis", None)
            .await
            .unwrap();

        let records = store
            .patterns_by_names(
                PROJECT,
                Category::Payment,
                &["negative-value".to_string()],
                10,
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].times_seen, 2);
        assert_eq!(records[0].confidence, 0.5);

        let project = store.get_project(PROJECT).await.unwrap().unwrap();
        assert_eq!(project.requests_analyzed, 2);

        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert_eq!(outcome.analysis.as_deref(), Some("second analysis"));
    }

    #[tokio::test]
    async fn ttl_config_assigns_expiry() {
        let config = CacheConfig {
            ttl_hours: Some(24),
            ..CacheConfig::default()
        };
        let (cache, store, _embedder) = harness(MockEmbedder::failing(), config).await;
        let parsed = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &parsed, "analysis", None)
            .await
            .unwrap();

        let entry = store
            .get_cache_entry(PROJECT, &parsed.hash, 1)
            .await
            .unwrap()
            .unwrap();
        assert!(entry.expires_at.is_some());
        assert!(entry.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_entries() {
        let (cache, store, _embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let live = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &live, "live analysis", None)
            .await
            .unwrap();
        store
            .upsert_cache_entry(
                CacheEntry::exact(PROJECT, "dead", "stale analysis")
                    .with_expiry(Utc::now() - Duration::hours(1)),
            )
            .await
            .unwrap();

        assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
        assert!(
            store
                .get_cache_entry(PROJECT, &live.hash, 1)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn stats_price_tokens_saved() {
        let (cache, _store, _embedder) =
            harness(MockEmbedder::failing(), CacheConfig::default()).await;
        let parsed = redtalon_compressor::parse(PLAIN_RAW);

        cache
            .store_in_cache(PROJECT, &parsed, "analysis", None)
            .await
            .unwrap();
        let outcome = cache.check_cache(PROJECT, &parsed).await;
        assert!(outcome.is_hit());

        let stats = cache.stats(PROJECT).await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_tokens_saved, 100);
        assert!((stats.estimated_cost_saved - 0.001).abs() < 1e-9);
        assert_eq!(stats.tiers.len(), 1);
        assert_eq!(stats.tiers[0].level, 1);
    }
}
