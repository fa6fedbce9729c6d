//! In-memory store — for tests and ephemeral, no-database runs.
//!
//! Implements the same counter-preservation and atomic-increment semantics
//! as the SQLite backend, just under a single `RwLock` instead of SQL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redtalon_core::{
    CacheEntry, CachedMatch, Category, CompressedRequestRecord, LearningLoop, PatternKind,
    PatternRecord, ProjectRecord, ProjectStat, SimilarRequest, Store, StoreError, SuccessMemory,
};
use tokio::sync::RwLock;

use crate::vector::cosine_similarity;

#[derive(Default)]
struct Inner {
    projects: HashMap<String, ProjectRecord>,
    // Keyed like the SQLite primary key: (project, hash, level).
    cache: HashMap<(String, String, u8), CacheEntry>,
    requests: Vec<CompressedRequestRecord>,
    patterns: HashMap<(String, Category, String), PatternRecord>,
    successes: HashMap<(String, String), SuccessMemory>,
    loops: Vec<LearningLoop>,
}

/// A store that keeps everything in process memory.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.projects.get(project_id).cloned())
    }

    async fn create_project(&self, project: ProjectRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .projects
            .entry(project.id.clone())
            .or_insert(project);
        Ok(())
    }

    async fn increment_project_stat(
        &self,
        project_id: &str,
        stat: ProjectStat,
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(project) = inner.projects.get_mut(project_id) {
            match stat {
                ProjectStat::RequestsAnalyzed => project.requests_analyzed += delta,
                ProjectStat::TokensSaved => project.tokens_saved += delta,
                ProjectStat::SuccessCount => project.success_count += delta,
                ProjectStat::FailureCount => project.failure_count += delta,
                ProjectStat::PartialCount => project.partial_count += delta,
            }
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn save_project_memory(
        &self,
        project_id: &str,
        notes: &str,
        learned_patterns: &[String],
        success_exploits: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(project) = inner.projects.get_mut(project_id) {
            project.ai_context_notes = notes.to_owned();
            project.learned_patterns = learned_patterns.to_vec();
            project.success_exploits = success_exploits.to_vec();
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_cache_entry(
        &self,
        project_id: &str,
        request_hash: &str,
        level: u8,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let inner = self.inner.read().await;
        let key = (project_id.to_owned(), request_hash.to_owned(), level);
        Ok(inner.cache.get(&key).cloned())
    }

    async fn upsert_cache_entry(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (
            entry.project_id.clone(),
            entry.request_hash.clone(),
            entry.cache_level,
        );
        match inner.cache.get_mut(&key) {
            Some(existing) => {
                // Same conflict rule as SQL: refresh content, keep counters
                // and the original creation time.
                existing.cached_analysis = entry.cached_analysis;
                existing.embedding = entry.embedding;
                existing.expires_at = entry.expires_at;
                existing.updated_at = entry.updated_at;
            }
            None => {
                inner.cache.insert(key, entry);
            }
        }
        Ok(())
    }

    async fn increment_cache_hit(
        &self,
        project_id: &str,
        request_hash: &str,
        tokens_saved_delta: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for (key, entry) in inner.cache.iter_mut() {
            if key.0 == project_id && key.1 == request_hash {
                entry.hit_count += 1;
                entry.tokens_saved += tokens_saved_delta;
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.cache.len();
        inner
            .cache
            .retain(|_, entry| entry.expires_at.is_none_or(|at| at >= now));
        Ok((before - inner.cache.len()) as u64)
    }

    async fn cache_entries(&self, project_id: &str) -> Result<Vec<CacheEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .cache
            .values()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn similar_cache_entries(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<CachedMatch>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<CachedMatch> = inner
            .cache
            .values()
            .filter(|e| e.project_id == project_id)
            .filter_map(|e| {
                let candidate = e.embedding.as_ref()?;
                let analysis = e.cached_analysis.as_ref()?;
                let similarity = cosine_similarity(candidate, embedding);
                (similarity > threshold).then(|| CachedMatch {
                    request_hash: e.request_hash.clone(),
                    analysis: analysis.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn record_compressed_request(
        &self,
        record: CompressedRequestRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.requests.push(record);
        Ok(())
    }

    async fn find_request_embedding(
        &self,
        project_id: &str,
        endpoint: &str,
        method: &str,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .requests
            .iter()
            .filter(|r| {
                r.project_id == project_id
                    && r.endpoint == endpoint
                    && r.method == method
                    && r.embedding.is_some()
            })
            .max_by_key(|r| r.created_at)
            .and_then(|r| r.embedding.clone()))
    }

    async fn similar_requests(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SimilarRequest>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<SimilarRequest> = inner
            .requests
            .iter()
            .filter(|r| r.project_id == project_id)
            .filter_map(|r| {
                let candidate = r.embedding.as_ref()?;
                let similarity = cosine_similarity(candidate, embedding);
                (similarity > threshold).then(|| SimilarRequest {
                    endpoint: r.endpoint.clone(),
                    method: r.method.clone(),
                    category: r.category,
                    digest: r.digest.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn observe_pattern(
        &self,
        project_id: &str,
        category: Category,
        name: &str,
        kind: PatternKind,
        initial_confidence: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (project_id.to_owned(), category, name.to_owned());
        match inner.patterns.get_mut(&key) {
            Some(pattern) => {
                pattern.times_seen += 1;
                pattern.last_seen = Utc::now();
            }
            None => {
                let now = Utc::now();
                inner.patterns.insert(
                    key,
                    PatternRecord {
                        project_id: project_id.to_owned(),
                        category,
                        name: name.to_owned(),
                        kind,
                        confidence: initial_confidence,
                        times_seen: 1,
                        last_seen: now,
                        created_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn patterns_by_names(
        &self,
        project_id: &str,
        category: Category,
        names: &[String],
        limit: usize,
    ) -> Result<Vec<PatternRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut found: Vec<PatternRecord> = inner
            .patterns
            .values()
            .filter(|p| {
                p.project_id == project_id
                    && p.category == category
                    && names.contains(&p.name)
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| b.times_seen.cmp(&a.times_seen));
        found.truncate(limit);
        Ok(found)
    }

    async fn top_patterns(
        &self,
        project_id: &str,
        min_confidence: f64,
        limit: usize,
    ) -> Result<Vec<PatternRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut found: Vec<PatternRecord> = inner
            .patterns
            .values()
            .filter(|p| p.project_id == project_id && p.confidence > min_confidence)
            .cloned()
            .collect();

        found.sort_by(|a, b| b.times_seen.cmp(&a.times_seen));
        found.truncate(limit);
        Ok(found)
    }

    async fn adjust_pattern_confidence(
        &self,
        project_id: &str,
        name: &str,
        delta: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for pattern in inner.patterns.values_mut() {
            if pattern.project_id == project_id && pattern.name == name {
                pattern.confidence = (pattern.confidence + delta).clamp(0.0, 1.0);
                pattern.last_seen = Utc::now();
            }
        }
        Ok(())
    }

    async fn prune_patterns(&self, project_id: &str, keep: usize) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut scoped: Vec<(Category, String, i64)> = inner
            .patterns
            .values()
            .filter(|p| p.project_id == project_id)
            .map(|p| (p.category, p.name.clone(), p.times_seen))
            .collect();
        scoped.sort_by(|a, b| b.2.cmp(&a.2));

        let doomed: Vec<(String, Category, String)> = scoped
            .into_iter()
            .skip(keep)
            .map(|(category, name, _)| (project_id.to_owned(), category, name))
            .collect();

        for key in &doomed {
            inner.patterns.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn upsert_success_memory(&self, memory: SuccessMemory) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (memory.project_id.clone(), memory.key.clone());
        match inner.successes.get_mut(&key) {
            Some(existing) => {
                existing.endpoint = memory.endpoint;
                existing.technique = memory.technique;
                existing.result = memory.result;
                existing.confidence = memory.confidence;
                existing.updated_at = memory.updated_at;
            }
            None => {
                inner.successes.insert(key, memory);
            }
        }
        Ok(())
    }

    async fn recent_success_memories(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<SuccessMemory>, StoreError> {
        let inner = self.inner.read().await;
        let mut memories: Vec<SuccessMemory> = inner
            .successes
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();

        memories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        memories.truncate(limit);
        Ok(memories)
    }

    async fn prune_success_memories(
        &self,
        project_id: &str,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut scoped: Vec<(String, DateTime<Utc>)> = inner
            .successes
            .values()
            .filter(|m| m.project_id == project_id)
            .map(|m| (m.key.clone(), m.updated_at))
            .collect();
        scoped.sort_by(|a, b| b.1.cmp(&a.1));

        let doomed: Vec<(String, String)> = scoped
            .into_iter()
            .skip(keep)
            .map(|(key, _)| (project_id.to_owned(), key))
            .collect();

        for key in &doomed {
            inner.successes.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn record_learning_loop(&self, entry: LearningLoop) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.loops.push(entry);
        Ok(())
    }

    async fn recent_learning_loops(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<LearningLoop>, StoreError> {
        let inner = self.inner.read().await;
        let mut loops: Vec<LearningLoop> = inner
            .loops
            .iter()
            .filter(|l| l.project_id == project_id)
            .cloned()
            .collect();

        loops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        loops.truncate(limit);
        Ok(loops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn project_create_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .create_project(ProjectRecord::new("p", "first"))
            .await
            .unwrap();
        store
            .create_project(ProjectRecord::new("p", "second"))
            .await
            .unwrap();

        let project = store.get_project("p").await.unwrap().unwrap();
        assert_eq!(project.name, "first");
    }

    #[tokio::test]
    async fn upsert_preserves_counters() {
        let store = InMemoryStore::new();
        store
            .upsert_cache_entry(CacheEntry::exact("p", "h", "v1"))
            .await
            .unwrap();
        store.increment_cache_hit("p", "h", 100).await.unwrap();
        store
            .upsert_cache_entry(CacheEntry::exact("p", "h", "v2"))
            .await
            .unwrap();

        let entry = store.get_cache_entry("p", "h", 1).await.unwrap().unwrap();
        assert_eq!(entry.cached_analysis.as_deref(), Some("v2"));
        assert_eq!(entry.hit_count, 1);
        assert_eq!(entry.tokens_saved, 100);
    }

    #[tokio::test]
    async fn expiry_sweep() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .upsert_cache_entry(
                CacheEntry::exact("p", "old", "a").with_expiry(now - chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        store
            .upsert_cache_entry(CacheEntry::exact("p", "keep", "b"))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_entries(now).await.unwrap(), 1);
        assert!(store.get_cache_entry("p", "old", 1).await.unwrap().is_none());
        assert!(store.get_cache_entry("p", "keep", 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn observe_pattern_increments() {
        let store = InMemoryStore::new();
        store
            .observe_pattern("p", Category::Auth, "jwt-token", PatternKind::Observed, 0.5)
            .await
            .unwrap();
        store
            .observe_pattern("p", Category::Auth, "jwt-token", PatternKind::Observed, 0.9)
            .await
            .unwrap();

        let found = store
            .patterns_by_names("p", Category::Auth, &["jwt-token".into()], 10)
            .await
            .unwrap();
        assert_eq!(found[0].times_seen, 2);
        assert_eq!(found[0].confidence, 0.5);
    }

    #[tokio::test]
    async fn confidence_clamps_at_bounds() {
        let store = InMemoryStore::new();
        store
            .observe_pattern("p", Category::Auth, "x", PatternKind::Discovered, 0.97)
            .await
            .unwrap();
        store.adjust_pattern_confidence("p", "x", 0.10).await.unwrap();

        let found = store
            .patterns_by_names("p", Category::Auth, &["x".into()], 10)
            .await
            .unwrap();
        assert_eq!(found[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn similarity_threshold_is_strict() {
        let store = InMemoryStore::new();
        store
            .upsert_cache_entry(
                CacheEntry::exact("p", "same", "a").with_embedding(vec![1.0, 0.0]),
            )
            .await
            .unwrap();

        // Identical vector scores 1.0, which is strictly above 0.95.
        let matches = store
            .similar_cache_entries("p", &[1.0, 0.0], 0.95, 5)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);

        // A threshold of exactly 1.0 excludes it.
        let matches = store
            .similar_cache_entries("p", &[1.0, 0.0], 1.0, 5)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn prune_patterns_keeps_top() {
        let store = InMemoryStore::new();
        for (name, seen) in [("a", 3), ("b", 1), ("c", 5)] {
            for _ in 0..seen {
                store
                    .observe_pattern("p", Category::Api, name, PatternKind::Observed, 0.5)
                    .await
                    .unwrap();
            }
        }

        assert_eq!(store.prune_patterns("p", 2).await.unwrap(), 1);
        let kept = store.top_patterns("p", 0.0, 10).await.unwrap();
        let names: Vec<&str> = kept.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn store_name() {
        assert_eq!(InMemoryStore::new().name(), "memory");
    }
}
