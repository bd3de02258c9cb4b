//! Request generations: each refresh cancels the one before it and gets a
//! guard the spawned task checks before publishing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Counter of issued requests plus the cancellation root of the newest one.
#[derive(Default)]
pub struct TaskGeneration {
    latest: Arc<AtomicU64>,
    root: RwLock<CancellationToken>,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the newest request and hand out a guard for its successor.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut root = self.root.write();
        std::mem::take(&mut *root).cancel();
        GenerationGuard {
            generation: self.latest.fetch_add(1, Ordering::SeqCst) + 1,
            latest: Arc::clone(&self.latest),
            token: root.child_token(),
        }
    }

    /// Cancel the newest request. No successor is issued.
    pub fn cancel_all(&self) {
        self.root.read().cancel();
    }
}

/// One request's view of the counter.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: u64,
    latest: Arc<AtomicU64>,
    token: CancellationToken,
}

impl GenerationGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// No newer request has been issued.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Still current and not cancelled.
    pub fn should_continue(&self) -> bool {
        !self.token.is_cancelled() && self.is_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_supersedes_older_guard() {
        let generations = TaskGeneration::new();
        let first = generations.cancel_and_advance();
        assert_eq!(first.generation(), 1);
        assert!(first.should_continue());

        let second = generations.cancel_and_advance();
        assert_eq!(second.generation(), 2);
        assert!(first.token().is_cancelled());
        assert!(!first.is_current());
        assert!(!first.should_continue());
        assert!(second.should_continue());
    }

    #[test]
    fn cancel_all_stops_the_newest_request_in_place() {
        let generations = TaskGeneration::new();
        let guard = generations.cancel_and_advance();
        generations.cancel_all();
        assert!(guard.is_current());
        assert!(guard.token().is_cancelled());
        assert!(!guard.should_continue());

        let next = generations.cancel_and_advance();
        assert_eq!(next.generation(), 2);
        assert!(next.should_continue());
    }
}
