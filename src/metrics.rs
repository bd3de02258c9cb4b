//! Pipeline observability: per-run identifiers, latency windows and outcome
//! counters.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Latency samples kept per metric.
const WINDOW: usize = 256;

/// Attached to every log line of one pipeline run.
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: Uuid,
    /// Coordinator generation that issued the run, 0 for direct calls.
    pub generation: u64,
}

impl RequestIds {
    pub fn new(generation: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            generation,
        }
    }
}

/// Started by [`MetricsRegistry::span`]; records into its window on `finish`.
pub struct TimingSpan {
    metric: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Elapsed milliseconds, also recorded.
    pub fn finish(self) -> f64 {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.registry.record(self.metric, elapsed_ms);
        elapsed_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Default)]
struct Recorded {
    windows: HashMap<&'static str, VecDeque<f64>>,
    counters: HashMap<&'static str, u64>,
}

/// Nearest-rank percentile over an ascending slice.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n => {
            let rank = ((p / 100.0) * (n - 1) as f64).round() as usize;
            sorted[rank.min(n - 1)]
        }
    }
}

fn sorted(window: &VecDeque<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = window.iter().copied().collect();
    values.sort_by(f64::total_cmp);
    values
}

#[derive(Default)]
pub struct MetricsRegistry {
    recorded: Mutex<Recorded>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn span(self: &Arc<Self>, metric: &'static str) -> TimingSpan {
        TimingSpan {
            metric,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn record(&self, metric: &'static str, value_ms: f64) {
        let mut recorded = self.recorded.lock();
        let window = recorded.windows.entry(metric).or_default();
        if window.len() == WINDOW {
            window.pop_front();
        }
        window.push_back(value_ms);
        tracing::trace!(metric, value_ms, "latency recorded");
    }

    pub fn increment(&self, counter: &'static str) {
        *self.recorded.lock().counters.entry(counter).or_default() += 1;
    }

    pub fn count(&self, counter: &str) -> u64 {
        self.recorded.lock().counters.get(counter).copied().unwrap_or(0)
    }

    /// Latency percentiles per metric plus every counter, in name order.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let recorded = self.recorded.lock();
        let latencies = recorded
            .windows
            .iter()
            .map(|(&metric, window)| {
                let values = sorted(window);
                let summary = LatencySummary {
                    samples: values.len(),
                    p50_ms: nearest_rank(&values, 50.0),
                    p95_ms: nearest_rank(&values, 95.0),
                    p99_ms: nearest_rank(&values, 99.0),
                };
                (metric, summary)
            })
            .collect();
        let counters = recorded.counters.iter().map(|(&k, &v)| (k, v)).collect();
        MetricsSnapshot { latencies, counters }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub latencies: BTreeMap<&'static str, LatencySummary>,
    pub counters: BTreeMap<&'static str, u64>,
}

/// Metric and counter names.
pub mod metric_names {
    pub const CACHE_LOOKUP: &str = "t_cache_lookup";
    pub const GENERATE_ATTEMPT: &str = "t_generate_attempt";
    pub const GENERATION_PHASE: &str = "t_generation_phase";
    pub const TRANSLATE: &str = "t_translate";
    pub const PIPELINE_TOTAL: &str = "t_pipeline_total";

    pub const CACHE_HIT: &str = "cache_hit";
    pub const GENERATION_RETRY: &str = "generation_retry";
    pub const FALLBACK_TIMEOUT: &str = "fallback_timeout";
    pub const FALLBACK_EMPTY: &str = "fallback_empty";
    pub const FALLBACK_REJECTED: &str = "fallback_rejected";
    pub const TRANSLATION_SKIPPED: &str = "translation_skipped";
    pub const SUPERSEDED: &str = "superseded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_nearest_rank_percentiles() {
        let registry = MetricsRegistry::new();
        for v in (1..=100).rev() {
            registry.record(metric_names::PIPELINE_TOTAL, v as f64);
        }
        let summary = &registry.snapshot().latencies[metric_names::PIPELINE_TOTAL];
        assert_eq!(summary.samples, 100);
        assert_eq!(summary.p50_ms, 51.0);
        assert_eq!(summary.p95_ms, 95.0);
        assert_eq!(summary.p99_ms, 99.0);
    }

    #[test]
    fn window_drops_oldest_samples() {
        let registry = MetricsRegistry::new();
        for _ in 0..WINDOW {
            registry.record(metric_names::TRANSLATE, 900.0);
        }
        for _ in 0..WINDOW {
            registry.record(metric_names::TRANSLATE, 5.0);
        }
        let summary = &registry.snapshot().latencies[metric_names::TRANSLATE];
        assert_eq!(summary.samples, WINDOW);
        assert_eq!(summary.p99_ms, 5.0);
    }

    #[test]
    fn counters_start_at_zero_and_appear_in_snapshot() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.count(metric_names::CACHE_HIT), 0);
        registry.increment(metric_names::CACHE_HIT);
        registry.increment(metric_names::CACHE_HIT);
        assert_eq!(registry.count(metric_names::CACHE_HIT), 2);
        assert_eq!(registry.snapshot().counters[metric_names::CACHE_HIT], 2);
        assert!(registry.snapshot().latencies.is_empty());
    }

    #[test]
    fn span_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        let elapsed = registry.span(metric_names::CACHE_LOOKUP).finish();
        assert!(elapsed >= 0.0);
        assert_eq!(registry.snapshot().latencies[metric_names::CACHE_LOOKUP].samples, 1);
    }
}
