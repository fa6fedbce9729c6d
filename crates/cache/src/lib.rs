//! # Redtalon Cache
//!
//! Three-tier cache over stored analyses. L1 serves exact content-hash
//! matches for free; L2 serves high-similarity neighbors for the cost of an
//! embedding; L3 turns known-pattern history into a compact context block
//! that shrinks the model prompt. Anything else is a miss and pays for a
//! full model call.
//!
//! The cache owns no state of its own — every durable byte lives in the
//! injected [`Store`](redtalon_core::Store), so concurrent analyses
//! coordinate only through the store's atomic increments.

mod outcome;
mod tiered;

pub use outcome::{CacheCost, CacheOutcome, CacheStats, CacheTier, TierStats};
pub use tiered::TieredCache;
