//! The feedback pipeline: record what the tester tried and learn from it.

use std::sync::Arc;

use redtalon_config::AppConfig;
use redtalon_context::ContextAssembler;
use redtalon_core::{
    Error, Outcome, PatternKind, ProjectRecord, ProjectStat, Result, Store, TestResult,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::prune::{EveryNthEvent, PrunePolicy};
use crate::suggest;

/// Starting confidence for a pattern first reported through feedback.
fn discovered_confidence(outcome: Outcome) -> f64 {
    match outcome {
        Outcome::Success => 0.8,
        Outcome::Partial => 0.5,
        _ => 0.2,
    }
}

/// Which project counter an outcome bumps. Inconclusive results are
/// recorded in the learning history but not counted.
fn outcome_stat(outcome: Outcome) -> Option<ProjectStat> {
    match outcome {
        Outcome::Success => Some(ProjectStat::SuccessCount),
        Outcome::Failure => Some(ProjectStat::FailureCount),
        Outcome::Partial => Some(ProjectStat::PartialCount),
        Outcome::Inconclusive => None,
    }
}

/// What one feedback submission changed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReport {
    pub project_id: String,
    pub outcome: Outcome,

    /// Whether long-lived project memory was written (successes only).
    pub memory_updated: bool,

    pub suggestions: Vec<String>,
    pub stats: LearningStats,
    pub pruned: bool,
}

/// Outcome totals across a project's counted feedback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LearningStats {
    pub total: i64,
    pub success: i64,
    pub failure: i64,
    pub partial: i64,

    /// Rounded percentage of successes over all counted outcomes.
    pub success_rate: i64,
}

impl LearningStats {
    fn from_project(project: &ProjectRecord) -> Self {
        let total = project.success_count + project.failure_count + project.partial_count;
        let success_rate = if total > 0 {
            ((project.success_count as f64 / total as f64) * 100.0).round() as i64
        } else {
            0
        };
        Self {
            total,
            success: project.success_count,
            failure: project.failure_count,
            partial: project.partial_count,
            success_rate,
        }
    }
}

/// Folds test results back into pattern statistics and project memory.
///
/// Counter updates go through the store's atomic increment/delta
/// operations only; concurrent submissions for the same project must not
/// lose updates.
pub struct FeedbackLoop {
    store: Arc<dyn Store>,
    assembler: ContextAssembler,
    prune: Arc<dyn PrunePolicy>,
}

impl FeedbackLoop {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let assembler = ContextAssembler::new(store.clone(), config.context.clone());
        let prune = Arc::new(EveryNthEvent::new(config.engine.prune_interval));
        Self {
            store,
            assembler,
            prune,
        }
    }

    /// Swap the prune policy (builder style).
    pub fn with_prune_policy(mut self, policy: Arc<dyn PrunePolicy>) -> Self {
        self.prune = policy;
        self
    }

    /// Record one test result and update everything it teaches us.
    ///
    /// Fails on invalid input or a missing project. Individual learning
    /// updates past the memory write are best-effort: a failed counter bump
    /// is logged, not fatal.
    pub async fn submit(&self, result: TestResult) -> Result<FeedbackReport> {
        if result.project_id.trim().is_empty() {
            return Err(Error::validation("project id is required"));
        }
        if result.test_performed.trim().is_empty() {
            return Err(Error::validation("test description is required"));
        }
        self.store
            .get_project(&result.project_id)
            .await?
            .ok_or_else(|| Error::not_found("project", result.project_id.as_str()))?;

        self.assembler.update_memory(&result).await?;

        if let Some(stat) = outcome_stat(result.outcome) {
            if let Err(e) = self
                .store
                .increment_project_stat(&result.project_id, stat, 1)
                .await
            {
                warn!(error = %e, "Failed to bump outcome counter");
            }
        }

        let delta = result.outcome.pattern_delta();
        if delta != 0.0 {
            for name in &result.patterns {
                if let Err(e) = self
                    .store
                    .adjust_pattern_confidence(&result.project_id, name, delta)
                    .await
                {
                    warn!(error = %e, pattern = %name, "Failed to adjust pattern confidence");
                }
            }
        }

        if let Some(name) = &result.discovered_pattern {
            if let Err(e) = self
                .store
                .observe_pattern(
                    &result.project_id,
                    result.category,
                    name,
                    PatternKind::Discovered,
                    discovered_confidence(result.outcome),
                )
                .await
            {
                warn!(error = %e, pattern = %name, "Failed to register discovered pattern");
            }
        }

        let pruned = if self.prune.should_prune() {
            match self.assembler.prune_context(&result.project_id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Prune pass failed");
                    false
                }
            }
        } else {
            false
        };

        let suggestions = suggest::next_tests(&result);
        let stats = self.learning_stats(&result.project_id).await;

        debug!(
            project_id = %result.project_id,
            outcome = %result.outcome,
            pruned,
            "Feedback recorded"
        );

        Ok(FeedbackReport {
            project_id: result.project_id,
            outcome: result.outcome,
            memory_updated: result.outcome == Outcome::Success,
            suggestions,
            stats,
            pruned,
        })
    }

    /// Outcome totals for a project, from its atomic counters.
    pub async fn learning_stats(&self, project_id: &str) -> LearningStats {
        match self.store.get_project(project_id).await {
            Ok(Some(project)) => LearningStats::from_project(&project),
            Ok(None) => LearningStats::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load learning stats");
                LearningStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_counters_skip_inconclusive() {
        assert_eq!(
            outcome_stat(Outcome::Success),
            Some(ProjectStat::SuccessCount)
        );
        assert_eq!(
            outcome_stat(Outcome::Failure),
            Some(ProjectStat::FailureCount)
        );
        assert_eq!(
            outcome_stat(Outcome::Partial),
            Some(ProjectStat::PartialCount)
        );
        assert_eq!(outcome_stat(Outcome::Inconclusive), None);
    }

    #[test]
    fn discovered_confidence_tracks_outcome() {
        assert_eq!(discovered_confidence(Outcome::Success), 0.8);
        assert_eq!(discovered_confidence(Outcome::Partial), 0.5);
        assert_eq!(discovered_confidence(Outcome::Failure), 0.2);
        assert_eq!(discovered_confidence(Outcome::Inconclusive), 0.2);
    }

    #[test]
    fn stats_round_the_success_rate() {
        let mut project = ProjectRecord::new("proj_1", "Shop");
        project.success_count = 2;
        project.failure_count = 1;
        let stats = LearningStats::from_project(&project);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success_rate, 67);
    }

    #[test]
    fn stats_on_a_fresh_project_are_zero() {
        let project = ProjectRecord::new("proj_1", "Shop");
        let stats = LearningStats::from_project(&project);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0);
    }
}
