//! Prune scheduling for the feedback pipeline.
//!
//! Retention pruning is amortized over feedback events instead of running
//! as a scheduled job. The policy deciding *when* is injectable so tests
//! (and deployments) get deterministic behavior.

use std::sync::atomic::{AtomicU64, Ordering};

/// Decides whether a prune pass should run after a feedback event.
pub trait PrunePolicy: Send + Sync {
    fn should_prune(&self) -> bool;
}

/// Fires on every `interval`-th feedback event.
pub struct EveryNthEvent {
    interval: u64,
    events: AtomicU64,
}

impl EveryNthEvent {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            events: AtomicU64::new(0),
        }
    }
}

impl PrunePolicy for EveryNthEvent {
    fn should_prune(&self) -> bool {
        let seen = self.events.fetch_add(1, Ordering::Relaxed) + 1;
        seen % self.interval == 0
    }
}

/// Never fires; for callers that prune on their own schedule.
pub struct NeverPrune;

impl PrunePolicy for NeverPrune {
    fn should_prune(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_every_nth_event() {
        let policy = EveryNthEvent::new(3);
        let fired: Vec<bool> = (0..9).map(|_| policy.should_prune()).collect();
        assert_eq!(
            fired,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn interval_of_one_fires_every_time() {
        let policy = EveryNthEvent::new(1);
        assert!(policy.should_prune());
        assert!(policy.should_prune());
    }

    #[test]
    fn zero_interval_is_clamped_instead_of_dividing_by_zero() {
        let policy = EveryNthEvent::new(0);
        assert!(policy.should_prune());
    }

    #[test]
    fn never_prune_never_fires() {
        let policy = NeverPrune;
        assert!(!policy.should_prune());
        assert!(!policy.should_prune());
    }
}
