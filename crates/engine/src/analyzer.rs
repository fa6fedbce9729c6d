//! The analyze pipeline: compress, check the cache, assemble context, call
//! the model, store the result.

use std::sync::Arc;

use chrono::Utc;
use redtalon_cache::{CacheCost, CacheOutcome, CacheStats, CacheTier, TieredCache};
use redtalon_config::AppConfig;
use redtalon_context::{ContextAssembler, SYSTEM_PROMPT, estimate_tokens};
use redtalon_core::{
    Category, Completer, CompletionRequest, CompressedRequestRecord, Embedder, Error,
    ParsedRequest, Result, Store,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Parsed-request metadata echoed back with every report.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionSummary {
    pub method: String,
    pub endpoint: String,
    pub category: Category,
    pub patterns: Vec<String>,
    pub attack_vectors: Vec<String>,
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
}

impl From<&ParsedRequest> for CompressionSummary {
    fn from(parsed: &ParsedRequest) -> Self {
        Self {
            method: parsed.method.clone(),
            endpoint: parsed.endpoint.clone(),
            category: parsed.category,
            patterns: parsed.patterns.clone(),
            attack_vectors: parsed.attack_vectors.clone(),
            original_size: parsed.original_size,
            compressed_size: parsed.compressed_size,
            compression_ratio: parsed.compression_ratio,
        }
    }
}

/// Result of one analysis run.
///
/// `analysis` is present whenever a model answer (fresh or cached) exists;
/// on a degraded run the assembled `context` is returned instead so the
/// tester can still take the prompt elsewhere.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub project_id: String,
    pub request_hash: String,
    pub tier: CacheTier,
    pub cost: CacheCost,
    pub confidence: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    pub compression: CompressionSummary,

    /// Similar past requests folded into the prompt.
    pub similar_requests: usize,

    /// Token-savings estimate credited for a cache hit; 0 on a fresh run.
    pub tokens_saved: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_estimate: Option<usize>,

    /// True when the completion service was unreachable.
    pub degraded: bool,
}

/// Orchestrates one analysis end to end.
///
/// Every collaborator is injected; the analyzer owns no durable state of
/// its own. Store and upstream failures past the validation step degrade
/// the result instead of failing it.
#[derive(Clone)]
pub struct Analyzer {
    store: Arc<dyn Store>,
    completer: Arc<dyn Completer>,
    cache: TieredCache,
    assembler: ContextAssembler,
    config: AppConfig,
}

impl Analyzer {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        config: AppConfig,
    ) -> Self {
        let cache = TieredCache::new(store.clone(), embedder, config.cache.clone());
        let assembler = ContextAssembler::new(store.clone(), config.context.clone());
        Self {
            store,
            completer,
            cache,
            assembler,
            config,
        }
    }

    /// Analyze one raw request for a project.
    ///
    /// Fails only on invalid input or a missing project; everything else
    /// degrades. An exact or high-similarity cache hit short-circuits
    /// before any context assembly or model call.
    pub async fn analyze(&self, project_id: &str, raw_request: &str) -> Result<AnalysisReport> {
        if project_id.trim().is_empty() {
            return Err(Error::validation("project id is required"));
        }
        if raw_request.trim().is_empty() {
            return Err(Error::validation("raw request text is required"));
        }

        let parsed = redtalon_compressor::parse(raw_request);
        debug!(
            hash = %parsed.hash,
            category = %parsed.category,
            ratio = parsed.compression_ratio,
            "Request compressed"
        );

        let outcome = self.cache.check_cache(project_id, &parsed).await;
        if outcome.is_final() {
            info!(project_id, tier = %outcome.tier, "Serving cached analysis");
            return Ok(self.cached_report(project_id, &parsed, outcome));
        }

        let context = self.assembler.load_project_context(project_id).await?;
        let include_history = outcome.tier != CacheTier::Pattern;
        let built = self.assembler.build_context(&context, &parsed, include_history);

        let mut prompt = match &outcome.context {
            Some(pattern_context) => format!("{pattern_context}\n\n{}", built.text),
            None => built.text,
        };

        // The corpus is searched before this request is recorded, so a
        // request never matches itself.
        let similar = self
            .similar_block(project_id, outcome.embedding.as_deref())
            .await;
        let similar_count = similar.as_ref().map_or(0, |(count, _)| *count);
        if let Some((_, block)) = similar {
            prompt.push_str(&block);
        }

        let estimated_tokens = estimate_tokens(&prompt, self.config.context.chars_per_token);
        debug!(estimated_tokens, include_history, "Context assembled");

        let mut request = CompletionRequest::new(SYSTEM_PROMPT, prompt.clone());
        request.max_tokens = self.config.completion.max_tokens;
        request.temperature = self.config.completion.temperature;

        let analysis = match self.completer.complete(request).await {
            Ok(completion) => completion.text,
            Err(e) => {
                warn!(error = %e, "Completion failed; returning assembled context only");
                return Ok(AnalysisReport {
                    project_id: project_id.to_string(),
                    request_hash: parsed.hash.clone(),
                    tier: outcome.tier,
                    cost: outcome.cost,
                    confidence: outcome.confidence,
                    analysis: None,
                    context: Some(prompt),
                    compression: CompressionSummary::from(&parsed),
                    similar_requests: similar_count,
                    tokens_saved: 0,
                    prompt_tokens_estimate: Some(estimated_tokens),
                    degraded: true,
                });
            }
        };

        if let Err(e) = self
            .cache
            .store_in_cache(project_id, &parsed, &analysis, outcome.embedding.clone())
            .await
        {
            warn!(error = %e, "Failed to cache fresh analysis");
        }
        if let Err(e) = self
            .record_request(project_id, &parsed, outcome.embedding)
            .await
        {
            warn!(error = %e, "Failed to record compressed request");
        }

        info!(project_id, hash = %parsed.hash, "Fresh analysis complete");
        Ok(AnalysisReport {
            project_id: project_id.to_string(),
            request_hash: parsed.hash.clone(),
            tier: outcome.tier,
            cost: outcome.cost,
            confidence: outcome.confidence,
            analysis: Some(analysis),
            context: None,
            compression: CompressionSummary::from(&parsed),
            similar_requests: similar_count,
            tokens_saved: 0,
            prompt_tokens_estimate: Some(estimated_tokens),
            degraded: false,
        })
    }

    /// Cache usage counters for one project.
    pub async fn cache_stats(&self, project_id: &str) -> Result<CacheStats> {
        self.cache.stats(project_id).await
    }

    /// Sweep expired cache entries; returns how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        self.cache.cleanup_expired().await
    }

    fn cached_report(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
        outcome: CacheOutcome,
    ) -> AnalysisReport {
        let tokens_saved = (parsed.original_size as f64
            / self.config.context.chars_per_token as f64
            * self.config.engine.fresh_savings_ratio)
            .floor() as i64;

        AnalysisReport {
            project_id: project_id.to_string(),
            request_hash: parsed.hash.clone(),
            tier: outcome.tier,
            cost: outcome.cost,
            confidence: outcome.confidence,
            analysis: outcome.analysis,
            context: None,
            compression: CompressionSummary::from(parsed),
            similar_requests: 0,
            tokens_saved,
            prompt_tokens_estimate: None,
            degraded: false,
        }
    }

    async fn similar_block(
        &self,
        project_id: &str,
        embedding: Option<&[f32]>,
    ) -> Option<(usize, String)> {
        let vector = embedding?;
        let matches = match self
            .store
            .similar_requests(
                project_id,
                vector,
                self.config.engine.similar_request_threshold,
                self.config.engine.similar_request_limit,
            )
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Similar-request lookup failed; continuing without it");
                return None;
            }
        };
        if matches.is_empty() {
            return None;
        }

        let lines: Vec<String> = matches
            .iter()
            .map(|m| {
                format!(
                    "- {} {} ({}): {:.0}% similar",
                    m.method,
                    m.endpoint,
                    m.category,
                    m.similarity * 100.0
                )
            })
            .collect();
        Some((
            matches.len(),
            format!("\n\nSIMILAR ANALYZED REQUESTS:\n{}", lines.join("\n")),
        ))
    }

    async fn record_request(
        &self,
        project_id: &str,
        parsed: &ParsedRequest,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let record = CompressedRequestRecord {
            project_id: project_id.to_string(),
            request_hash: parsed.hash.clone(),
            endpoint: parsed.endpoint.clone(),
            method: parsed.method.clone(),
            category: parsed.category,
            digest: redtalon_compressor::compress_for_context(parsed),
            embedding,
            original_size: parsed.original_size as i64,
            compressed_size: parsed.compressed_size as i64,
            created_at: Utc::now(),
        };
        self.store.record_compressed_request(record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_summary_mirrors_the_parse() {
        let parsed = redtalon_compressor::parse(
            "GET /api/payment/process?amount=-1 HTTP/1.1\nHost: shop.example.com\n\n",
        );
        let summary = CompressionSummary::from(&parsed);
        assert_eq!(summary.method, "GET");
        assert_eq!(summary.endpoint, "/api/payment/process");
        assert_eq!(summary.category, Category::Payment);
        assert!(summary.patterns.iter().any(|p| p == "negative-value"));
        assert_eq!(summary.original_size, parsed.original_size);
    }

    #[test]
    fn report_serialization_skips_absent_fields() {
        let parsed = redtalon_compressor::parse("GET / HTTP/1.1\n\n");
        let report = AnalysisReport {
            project_id: "proj_1".into(),
            request_hash: parsed.hash.clone(),
            tier: CacheTier::Miss,
            cost: CacheCost::Full,
            confidence: 0.0,
            analysis: None,
            context: None,
            compression: CompressionSummary::from(&parsed),
            similar_requests: 0,
            tokens_saved: 0,
            prompt_tokens_estimate: None,
            degraded: true,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("\"analysis\""));
        assert!(!json.contains("\"context\""));
        assert!(json.contains("\"degraded\":true"));
    }
}
