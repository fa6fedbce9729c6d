//! Analysis and feedback pipelines for redtalon.
//!
//! Two entry points wire the other crates together: [`Analyzer::analyze`]
//! runs compress → cache check → context assembly → model call → store for
//! one raw request, and [`FeedbackLoop::submit`] folds a tester's result
//! back into pattern statistics and project memory.

mod analyzer;
mod feedback;
mod prune;
mod suggest;

pub use analyzer::{AnalysisReport, Analyzer, CompressionSummary};
pub use feedback::{FeedbackLoop, FeedbackReport, LearningStats};
pub use prune::{EveryNthEvent, NeverPrune, PrunePolicy};
