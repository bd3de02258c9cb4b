//! Pipeline phases: Pending → CacheHit → Done, or
//! Pending → Generating → Validating → (Translating) → Finalizing → Done,
//! with Fallback reachable from every non-terminal phase.

use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::RequestIds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ForecastPhase {
    Pending,
    CacheHit,
    Generating,
    Validating,
    Translating,
    Finalizing,
    Fallback,
    Done,
}

impl std::fmt::Display for ForecastPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ForecastPhase::Pending => "Pending",
            ForecastPhase::CacheHit => "CacheHit",
            ForecastPhase::Generating => "Generating",
            ForecastPhase::Validating => "Validating",
            ForecastPhase::Translating => "Translating",
            ForecastPhase::Finalizing => "Finalizing",
            ForecastPhase::Fallback => "Fallback",
            ForecastPhase::Done => "Done",
        };
        f.write_str(name)
    }
}

impl ForecastPhase {
    pub fn can_transition_to(self, next: ForecastPhase) -> bool {
        use ForecastPhase::*;
        match (self, next) {
            (Done, _) => false,
            (Fallback, Done) => true,
            (Fallback, _) => false,
            (_, Fallback) => true,
            _ => matches!(
                (self, next),
                (Pending, CacheHit)
                    | (Pending, Generating)
                    | (CacheHit, Done)
                    | (Generating, Validating)
                    | (Validating, Translating)
                    | (Validating, Finalizing)
                    | (Translating, Finalizing)
                    | (Finalizing, Done)
            ),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ForecastPhase::Done
    }
}

/// Phase bookkeeping for one pipeline run. Owned by the run, never shared.
pub struct PhaseTracker {
    phase: ForecastPhase,
    ids: RequestIds,
}

impl PhaseTracker {
    pub fn new(ids: RequestIds) -> Self {
        Self {
            phase: ForecastPhase::Pending,
            ids,
        }
    }

    pub fn current(&self) -> ForecastPhase {
        self.phase
    }

    pub fn ids(&self) -> &RequestIds {
        &self.ids
    }

    /// Move to `next`. Invalid transitions are logged and ignored.
    pub fn transition(&mut self, next: ForecastPhase) -> bool {
        let current = self.phase;
        if !current.can_transition_to(next) {
            warn!(
                request_id = %self.ids.request_id,
                from = %current,
                to = %next,
                "invalid forecast phase transition"
            );
            return false;
        }
        self.phase = next;
        debug!(
            request_id = %self.ids.request_id,
            generation = self.ids.generation,
            from = %current,
            to = %next,
            "forecast_phase"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ForecastPhase::*;

    #[test]
    fn full_translation_path_is_valid() {
        let mut tracker = PhaseTracker::new(RequestIds::new(1));
        for next in [Generating, Validating, Translating, Finalizing, Done] {
            assert!(tracker.transition(next), "-> {next}");
        }
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn fallback_reachable_until_done() {
        for phase in [Pending, CacheHit, Generating, Validating, Translating, Finalizing] {
            assert!(phase.can_transition_to(Fallback), "{phase}");
        }
        assert!(!Done.can_transition_to(Fallback));
        assert!(Fallback.can_transition_to(Done));
        assert!(!Fallback.can_transition_to(Generating));
    }

    #[test]
    fn skipping_validation_is_rejected() {
        let mut tracker = PhaseTracker::new(RequestIds::new(1));
        tracker.transition(Generating);
        assert!(!tracker.transition(Finalizing));
        assert_eq!(tracker.current(), Generating);
    }
}
