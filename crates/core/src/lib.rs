//! # Redtalon Core
//!
//! Domain types, traits, and error definitions for the redtalon analysis
//! engine. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping store and provider backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod record;
pub mod request;
pub mod service;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StoreError, UpstreamError};
pub use record::{
    CacheEntry, CompressedRequestRecord, LearningLoop, Outcome, PatternKind, PatternRecord,
    ProjectRecord, SuccessMemory, TestResult,
};
pub use request::{Category, CriticalData, ParsedRequest};
pub use service::{Completer, Completion, CompletionRequest, Embedder, Usage};
pub use store::{CachedMatch, ProjectStat, SimilarRequest, Store};
