//! Context assembly for redtalon.
//!
//! Turns a project's accumulated memory (patterns, successes, recent tests,
//! notes) plus one parsed request into the prompt sent to the completion
//! model, and folds test feedback back into that memory.

pub mod assembler;
pub mod prompt;
pub mod token;

pub use assembler::{BuiltContext, ContextAssembler, ProjectContext};
pub use prompt::{MINDSET, SYSTEM_PROMPT};
pub use token::estimate_tokens;
