// ── Echo suppression ──
//
// Every push to the bridge is stamped with a fresh generation. When the
// bridge raises a command while applying one of those pushes it echoes
// the generation back, which is how the engine tells its own writes
// apart from genuine changes made in the ecosystem. Overlapping pushes
// are fine: any generation already issued counts as ours.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GenerationTracker {
    last: AtomicU64,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the generation for the next push. Starts at 1.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Most recently issued generation, 0 before the first push.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    /// Whether a command tagged with `generation` was caused by our own push.
    pub fn is_echo(&self, generation: Option<u64>) -> bool {
        generation.is_some_and(|g| g != 0 && g <= self.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_generations_are_echoes() {
        let tracker = GenerationTracker::new();
        assert!(!tracker.is_echo(Some(1)));

        let first = tracker.next();
        let second = tracker.next();
        assert_eq!((first, second), (1, 2));
        assert!(tracker.is_echo(Some(first)));
        assert!(tracker.is_echo(Some(second)));
    }

    #[test]
    fn untagged_and_unissued_generations_are_genuine() {
        let tracker = GenerationTracker::new();
        tracker.next();
        assert!(!tracker.is_echo(None));
        assert!(!tracker.is_echo(Some(0)));
        assert!(!tracker.is_echo(Some(5)));
    }
}
