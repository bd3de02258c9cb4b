//! Forecast pipeline: cache → generate (with one retry) → validate →
//! translate → finalize, degrading to the localized fallback paragraph.
//! Every run ends with text unless it was superseded.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::config::PipelineConfig;
use crate::generate::GenerationClient;
use crate::locale::LocaleTable;
use crate::metrics::{metric_names, MetricsRegistry, RequestIds, TimingSpan};
use crate::sanitize::{is_readable, GenerationAttempt, Sanitizer};
use crate::state_machine::{ForecastPhase, PhaseTracker};
use crate::subject::{normalize_language_code, ForecastSubject, Horoscope};
use crate::timeout::{race, RaceOutcome};
use crate::translate::ForecastTranslator;

pub struct ForecastOrchestrator {
    generation: GenerationClient,
    translator: ForecastTranslator,
    cache: Arc<BoundedCache>,
    locale: Arc<LocaleTable>,
    sanitizer: Sanitizer,
    pipeline: PipelineConfig,
    metrics: Arc<MetricsRegistry>,
}

impl ForecastOrchestrator {
    pub fn new(
        generation: GenerationClient,
        translator: ForecastTranslator,
        cache: Arc<BoundedCache>,
        locale: Arc<LocaleTable>,
        pipeline: PipelineConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let sanitizer = Sanitizer::new(locale.labels(), pipeline.max_words);
        Self {
            generation,
            translator,
            cache,
            locale,
            sanitizer,
            pipeline,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn fallback_text(&self, subject: &ForecastSubject) -> &str {
        self.locale.fallback_text(subject.language())
    }

    /// Total form: always returns text.
    pub async fn generate_forecast(&self, subject: &ForecastSubject) -> String {
        match self.run(subject, &CancellationToken::new()).await {
            Some(text) => text,
            None => self.fallback_text(subject).to_string(),
        }
    }

    pub async fn weekly_horoscope(&self, subject: &ForecastSubject) -> Horoscope {
        let text = self.generate_forecast(subject).await;
        horoscope_for(subject, text)
    }

    /// `None` only when `cancel` fired; a superseded run writes nothing.
    pub async fn run(&self, subject: &ForecastSubject, cancel: &CancellationToken) -> Option<String> {
        self.run_with_ids(subject, cancel, RequestIds::new(0)).await
    }

    pub async fn run_with_ids(
        &self,
        subject: &ForecastSubject,
        cancel: &CancellationToken,
        ids: RequestIds,
    ) -> Option<String> {
        let total = self.metrics.span(metric_names::PIPELINE_TOTAL);
        let mut tracker = PhaseTracker::new(ids);
        let key = subject.cache_key();
        let fallback = self.fallback_text(subject);

        let lookup = self.metrics.span(metric_names::CACHE_LOOKUP);
        let cached = self.cache.get(&key);
        lookup.finish();

        if let Some(cached) = cached.filter(|value| value != fallback) {
            let refreshed = self.sanitizer.finalize(&cached);
            if !refreshed.is_empty() {
                tracker.transition(ForecastPhase::CacheHit);
                if refreshed != cached {
                    debug!(key = %key, "cached forecast re-sanitized");
                    self.cache.set(&key, &refreshed);
                }
                self.metrics.increment(metric_names::CACHE_HIT);
                tracker.transition(ForecastPhase::Done);
                let elapsed_ms = total.finish();
                debug!(key = %key, elapsed_ms, "forecast served from cache");
                return Some(refreshed);
            }
        }

        tracker.transition(ForecastPhase::Generating);
        let prompt = self.locale.build_prompt(subject);
        let phase = self.metrics.span(metric_names::GENERATION_PHASE);
        let outcome = race(self.pipeline.generation_timeout, cancel, |token| {
            let prompt = &prompt;
            async move { self.generate_with_retry(prompt, &token).await }
        })
        .await;
        phase.finish();

        let generated = match outcome {
            RaceOutcome::Completed(text) => text,
            RaceOutcome::TimedOut => {
                warn!(
                    request_id = %tracker.ids().request_id,
                    timeout_secs = self.pipeline.generation_timeout.as_secs(),
                    "generation timed out, using fallback"
                );
                self.metrics.increment(metric_names::FALLBACK_TIMEOUT);
                return Some(self.finish_with_fallback(&mut tracker, fallback, total));
            }
            RaceOutcome::Cancelled => return self.superseded(&tracker),
        };

        tracker.transition(ForecastPhase::Validating);
        if generated.is_empty() {
            info!(request_id = %tracker.ids().request_id, "no generated text, using fallback");
            self.metrics.increment(metric_names::FALLBACK_EMPTY);
            return Some(self.finish_with_fallback(&mut tracker, fallback, total));
        }
        if !is_readable(&generated) {
            info!(
                request_id = %tracker.ids().request_id,
                words = generated.split_whitespace().count(),
                "generated text failed readability gate, using fallback"
            );
            self.metrics.increment(metric_names::FALLBACK_REJECTED);
            return Some(self.finish_with_fallback(&mut tracker, fallback, total));
        }

        let mut text = generated;
        if subject.language() != normalize_language_code(&self.pipeline.base_language) {
            tracker.transition(ForecastPhase::Translating);
            let outcome = race(self.pipeline.translation_timeout, cancel, |token| {
                let source = &text;
                async move {
                    self.translator
                        .translate(source, subject.language(), &token)
                        .await
                }
            })
            .await;

            match outcome {
                RaceOutcome::Completed(translated) => {
                    let translated = self.sanitizer.finalize(&translated);
                    if !translated.is_empty() {
                        text = translated;
                    }
                }
                RaceOutcome::TimedOut => {
                    warn!(
                        request_id = %tracker.ids().request_id,
                        language = subject.language(),
                        "translation timed out, keeping untranslated text"
                    );
                }
                RaceOutcome::Cancelled => return self.superseded(&tracker),
            }
        }

        tracker.transition(ForecastPhase::Finalizing);
        if cancel.is_cancelled() {
            return self.superseded(&tracker);
        }
        if text != fallback {
            self.cache.set(&key, &text);
        }
        tracker.transition(ForecastPhase::Done);
        let elapsed_ms = total.finish();
        info!(
            request_id = %tracker.ids().request_id,
            generation = tracker.ids().generation,
            language = subject.language(),
            words = text.split_whitespace().count(),
            elapsed_ms,
            "forecast generated"
        );
        Some(text)
    }

    /// First attempt at the smaller budget; one retry at the larger budget
    /// when the first is short or unterminated.
    async fn generate_with_retry(&self, prompt: &str, cancel: &CancellationToken) -> String {
        let first = self
            .attempt(prompt, self.pipeline.first_attempt_tokens, cancel)
            .await
            .unwrap_or_else(|| GenerationAttempt::new(String::new()));
        if !first.needs_retry() || cancel.is_cancelled() {
            return first.text;
        }

        self.metrics.increment(metric_names::GENERATION_RETRY);
        debug!(words = first.word_count, terminated = first.terminated, "retrying generation");
        match self.attempt(prompt, self.pipeline.retry_tokens, cancel).await {
            Some(retry) => first.prefer(retry).text,
            None => first.text,
        }
    }

    async fn attempt(
        &self,
        prompt: &str,
        max_tokens: u32,
        cancel: &CancellationToken,
    ) -> Option<GenerationAttempt> {
        let span = self.metrics.span(metric_names::GENERATE_ATTEMPT);
        let raw = self.generation.generate(prompt, max_tokens, cancel).await;
        span.finish();
        raw.map(|raw| GenerationAttempt::new(self.sanitizer.finalize(&raw)))
    }

    fn finish_with_fallback(
        &self,
        tracker: &mut PhaseTracker,
        fallback: &str,
        total: TimingSpan,
    ) -> String {
        tracker.transition(ForecastPhase::Fallback);
        tracker.transition(ForecastPhase::Done);
        total.finish();
        fallback.to_string()
    }

    fn superseded(&self, tracker: &PhaseTracker) -> Option<String> {
        self.metrics.increment(metric_names::SUPERSEDED);
        debug!(
            request_id = %tracker.ids().request_id,
            generation = tracker.ids().generation,
            phase = %tracker.current(),
            "forecast run superseded"
        );
        None
    }
}

pub fn horoscope_for(subject: &ForecastSubject, text: String) -> Horoscope {
    Horoscope {
        sign: subject.sun_sign(),
        week_of_year: subject.iso_week(),
        paragraphs: vec![text],
    }
}
