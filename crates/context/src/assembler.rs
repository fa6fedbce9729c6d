//! Project context loading, prompt assembly, and memory updates.

use std::sync::Arc;

use chrono::Utc;
use redtalon_config::ContextConfig;
use redtalon_core::{
    Error, LearningLoop, Outcome, ParsedRequest, PatternRecord, ProjectRecord, Result, Store,
    SuccessMemory, TestResult,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::prompt::{self, MINDSET};
use crate::token::estimate_tokens;

/// Characters of serialized critical data shown in the request block.
const CRITICAL_PROMPT_CHARS: usize = 500;

/// Attack vectors listed in the request block.
const PROMPT_VECTORS: usize = 5;

/// Everything known about a project that is worth telling the model.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project: ProjectRecord,

    /// Highest-signal pattern records, best-established first.
    pub patterns: Vec<PatternRecord>,

    pub recent_successes: Vec<SuccessMemory>,
    pub recent_loops: Vec<LearningLoop>,
}

/// An assembled prompt plus its estimated token cost.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltContext {
    pub text: String,
    pub estimated_tokens: usize,
}

/// Builds prompts from project memory and folds test feedback back in.
#[derive(Clone)]
pub struct ContextAssembler {
    store: Arc<dyn Store>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn Store>, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Load the project descriptor and its learning history.
    ///
    /// A missing project is a hard error. The history lists are
    /// best-effort: a store failure there degrades to a thinner prompt
    /// instead of failing the analysis.
    pub async fn load_project_context(&self, project_id: &str) -> Result<ProjectContext> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::not_found("project", project_id))?;

        let patterns = match self
            .store
            .top_patterns(
                project_id,
                self.config.pattern_confidence_floor,
                self.config.pattern_limit,
            )
            .await
        {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!(error = %e, "Pattern history unavailable; continuing without it");
                Vec::new()
            }
        };

        let recent_successes = match self
            .store
            .recent_success_memories(project_id, self.config.success_limit)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!(error = %e, "Success memory unavailable; continuing without it");
                Vec::new()
            }
        };

        let recent_loops = match self
            .store
            .recent_learning_loops(project_id, self.config.loop_limit)
            .await
        {
            Ok(loops) => loops,
            Err(e) => {
                warn!(error = %e, "Learning history unavailable; continuing without it");
                Vec::new()
            }
        };

        Ok(ProjectContext {
            project,
            patterns,
            recent_successes,
            recent_loops,
        })
    }

    /// Assemble the model prompt for one request.
    ///
    /// With `include_history` the full project memory is folded in. Without
    /// it (a pattern-context cache hit already supplies history) the prompt
    /// shrinks to the mindset, a one-line project tag, and the request.
    pub fn build_context(
        &self,
        context: &ProjectContext,
        parsed: &ParsedRequest,
        include_history: bool,
    ) -> BuiltContext {
        let request = request_block(parsed);

        let text = if include_history {
            format!(
                "{MINDSET}\n\n{}\n\n{request}\n\n{}",
                memory_block(context),
                prompt::ANALYZE_CLOSING
            )
        } else {
            format!(
                "{MINDSET}\n\nPROJECT: {}\n\n{request}\n\n{}",
                project_descriptor(&context.project),
                prompt::SHORT_CLOSING
            )
        };

        let estimated_tokens = estimate_tokens(&text, self.config.chars_per_token);
        BuiltContext {
            text,
            estimated_tokens,
        }
    }

    /// Fold one test result into the project's memory.
    ///
    /// Every result appends a learning-loop record. A success additionally
    /// writes a long-lived success memory and updates the project's notes,
    /// learned pattern names, and exploit list.
    pub async fn update_memory(&self, result: &TestResult) -> Result<()> {
        let entry = LearningLoop {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: result.project_id.clone(),
            request_hash: result.request_hash.clone(),
            endpoint: result.endpoint.clone(),
            category: result.category,
            test_performed: result.test_performed.clone(),
            outcome: result.outcome,
            notes: result.notes.clone(),
            confidence: result.outcome.confidence(),
            created_at: Utc::now(),
        };
        self.store.record_learning_loop(entry).await?;

        if result.outcome == Outcome::Success {
            self.record_success(result).await?;
        }
        Ok(())
    }

    async fn record_success(&self, result: &TestResult) -> Result<()> {
        let project = self
            .store
            .get_project(&result.project_id)
            .await?
            .ok_or_else(|| Error::not_found("project", result.project_id.as_str()))?;

        let now = Utc::now();
        let summary = result
            .notes
            .clone()
            .unwrap_or_else(|| "confirmed".to_string());

        let memory = SuccessMemory::new(
            result.project_id.as_str(),
            format!("success-{}", now.timestamp_millis()),
            result.endpoint.as_str(),
            result.test_performed.as_str(),
            summary.as_str(),
            result.outcome.confidence(),
        );
        self.store.upsert_success_memory(memory).await?;

        // dated note line; oldest characters are dropped to honor the cap
        let line = format!(
            "✓ {}: {} → {}",
            now.format("%Y-%m-%d"),
            result.test_performed,
            summary
        );
        let notes = if project.ai_context_notes.is_empty() {
            line
        } else {
            format!("{}\n{line}", project.ai_context_notes)
        };
        let notes = keep_tail_chars(&notes, self.config.notes_cap_chars);

        let mut learned = project.learned_patterns.clone();
        if let Some(pattern) = &result.discovered_pattern {
            if !learned.contains(pattern) {
                learned.push(pattern.clone());
            }
        }

        let mut exploits = project.success_exploits.clone();
        exploits.push(format!("{} → {summary}", result.test_performed));
        if exploits.len() > self.config.exploit_keep {
            exploits.drain(..exploits.len() - self.config.exploit_keep);
        }

        self.store
            .save_project_memory(&result.project_id, &notes, &learned, &exploits)
            .await?;

        debug!(project_id = %result.project_id, "Success folded into project memory");
        Ok(())
    }

    /// Trim stored history to the configured retention bounds.
    pub async fn prune_context(&self, project_id: &str) -> Result<()> {
        let patterns_removed = self
            .store
            .prune_patterns(project_id, self.config.prune_pattern_keep)
            .await?;
        let memories_removed = self
            .store
            .prune_success_memories(project_id, self.config.prune_success_keep)
            .await?;

        if patterns_removed > 0 || memories_removed > 0 {
            debug!(patterns_removed, memories_removed, "Context pruned");
        }
        Ok(())
    }
}

fn project_descriptor(project: &ProjectRecord) -> &str {
    project.domain.as_deref().unwrap_or(project.name.as_str())
}

fn memory_block(context: &ProjectContext) -> String {
    let project = &context.project;

    let mut block = format!(
        "PROJECT CONTEXT: {}\n\nKNOWN PATTERNS:\n{}",
        project_descriptor(project),
        format_patterns(&context.patterns)
    );

    if !project.learned_patterns.is_empty() {
        block.push_str(&format!(
            "\nConfirmed pattern names: {}",
            project.learned_patterns.join(", ")
        ));
    }

    block.push_str(&format!(
        "\n\nCONFIRMED EXPLOITS (what worked):\n{}",
        format_successes(&context.recent_successes)
    ));
    block.push_str(&format!(
        "\n\nRECENT TESTS:\n{}",
        format_recent_tests(&context.recent_loops)
    ));

    let notes = if project.ai_context_notes.is_empty() {
        "No specific notes"
    } else {
        project.ai_context_notes.as_str()
    };
    block.push_str(&format!("\n\nPROJECT NOTES:\n{notes}"));

    block
}

fn format_patterns(patterns: &[PatternRecord]) -> String {
    if patterns.is_empty() {
        return "No confirmed patterns for this project yet".to_string();
    }
    patterns
        .iter()
        .map(|p| {
            format!(
                "- {}/{}: seen {}x, confidence {:.0}%",
                p.category,
                p.name,
                p.times_seen,
                p.confidence * 100.0
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_successes(memories: &[SuccessMemory]) -> String {
    if memories.is_empty() {
        return "No confirmed exploits yet".to_string();
    }
    memories
        .iter()
        .map(|m| format!("✓ {} → {}", m.technique, m.result))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_recent_tests(loops: &[LearningLoop]) -> String {
    if loops.is_empty() {
        return "No recent tests".to_string();
    }
    loops
        .iter()
        .map(|l| {
            let detail = l.notes.as_deref().unwrap_or("no details");
            format!("{} → {detail} ({})", l.test_performed, l.outcome)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn request_block(parsed: &ParsedRequest) -> String {
    let domain = parsed.domain.as_deref().unwrap_or("unknown");
    let patterns = if parsed.patterns.is_empty() {
        "None".to_string()
    } else {
        parsed.patterns.join(", ")
    };
    let vectors = parsed
        .attack_vectors
        .iter()
        .take(PROMPT_VECTORS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CURRENT REQUEST:\nEndpoint: {} {}\nDomain: {domain}\nCategory: {}\n\n\
         CRITICAL DATA:\n{}\n\nDETECTED PATTERNS:\n{patterns}\n\n\
         POSSIBLE ATTACK VECTORS:\n{vectors}",
        parsed.method,
        parsed.endpoint,
        parsed.category,
        truncate_chars(&parsed.critical.serialized(), CRITICAL_PROMPT_CHARS)
    )
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn keep_tail_chars(text: &str, cap: usize) -> String {
    let count = text.chars().count();
    if count <= cap {
        text.to_string()
    } else {
        text.chars().skip(count - cap).collect()
    }
}
