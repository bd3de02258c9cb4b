//! Single-flight request coordination. Each refresh supersedes the previous
//! one; only the latest generation may publish.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cancellation::{GenerationGuard, TaskGeneration};
use crate::metrics::RequestIds;
use crate::orchestrator::{horoscope_for, ForecastOrchestrator};
use crate::subject::{normalize_language_code, ForecastSubject, Horoscope};

/// Source of the active display language.
pub trait LanguageProvider: Send + Sync {
    /// Raw identifier such as `pt_BR` or `es-ES`.
    fn current_language(&self) -> String;
}

#[derive(Debug, Default)]
pub struct FixedLanguage {
    language: Mutex<String>,
}

impl FixedLanguage {
    pub fn new(language: &str) -> Self {
        Self {
            language: Mutex::new(language.to_string()),
        }
    }

    pub fn set(&self, language: &str) {
        *self.language.lock() = language.to_string();
    }
}

impl LanguageProvider for FixedLanguage {
    fn current_language(&self) -> String {
        self.language.lock().clone()
    }
}

/// POSIX locale variables, first non-empty of `LC_ALL`, `LC_MESSAGES`, `LANG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLanguage;

impl LanguageProvider for EnvLanguage {
    fn current_language(&self) -> String {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .map(|value| strip_locale_suffix(&value))
            .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
            .unwrap_or_else(|| "en".to_string())
    }
}

/// `de_DE.UTF-8@euro` → `de_DE`.
fn strip_locale_suffix(value: &str) -> String {
    value
        .split(|c| c == '.' || c == '@')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// What the UI observes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForecastState {
    pub horoscope: Option<Horoscope>,
    pub is_loading_forecast: bool,
    pub is_loading_model: bool,
}

#[derive(Default)]
struct CoordinatorInner {
    subject: Option<ForecastSubject>,
    in_flight_language: Option<String>,
    last_completed_language: Option<String>,
    task: Option<JoinHandle<()>>,
}

pub struct ForecastCoordinator {
    orchestrator: Arc<ForecastOrchestrator>,
    language: Arc<dyn LanguageProvider>,
    generations: TaskGeneration,
    inner: Mutex<CoordinatorInner>,
    state: watch::Sender<ForecastState>,
}

impl ForecastCoordinator {
    pub fn new(orchestrator: Arc<ForecastOrchestrator>, language: Arc<dyn LanguageProvider>) -> Arc<Self> {
        let (state, _) = watch::channel(ForecastState::default());
        Arc::new(Self {
            orchestrator,
            language,
            generations: TaskGeneration::new(),
            inner: Mutex::new(CoordinatorInner::default()),
            state,
        })
    }

    /// Normalized code of the active display language.
    pub fn current_language_code(&self) -> String {
        normalize_language_code(&self.language.current_language())
    }

    /// Supersede any running generation and start one for `subject`.
    /// Must be called within a tokio runtime.
    pub fn refresh(self: &Arc<Self>, subject: ForecastSubject) {
        let mut inner = self.inner.lock();
        let guard = self.generations.cancel_and_advance();
        if let Some(previous) = inner.task.take() {
            // Token is already cancelled; abort drops it at its next await.
            previous.abort();
        }

        inner.subject = Some(subject.clone());
        inner.in_flight_language = Some(subject.language().to_string());
        self.state.send_modify(|state| {
            state.is_loading_forecast = true;
            state.is_loading_model = true;
        });
        debug!(
            generation = guard.generation(),
            key = %subject.cache_key(),
            "forecast refresh issued"
        );

        let this = Arc::clone(self);
        inner.task = Some(tokio::spawn(async move {
            let ids = RequestIds::new(guard.generation());
            let result = this
                .orchestrator
                .run_with_ids(&subject, guard.token(), ids)
                .await;
            this.publish(&guard, &subject, result);
        }));
    }

    /// Publish a finished run unless a newer refresh or `cancel` superseded
    /// it while it ran. Returns whether the state changed.
    fn publish(
        &self,
        guard: &GenerationGuard,
        subject: &ForecastSubject,
        result: Option<String>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if !guard.should_continue() {
            debug!(generation = guard.generation(), "discarding superseded forecast");
            return false;
        }
        let Some(text) = result else {
            return false;
        };

        inner.last_completed_language = Some(subject.language().to_string());
        inner.in_flight_language = None;
        inner.task = None;
        let horoscope = horoscope_for(subject, text);
        self.state.send_modify(|state| {
            state.horoscope = Some(horoscope);
            state.is_loading_forecast = false;
            state.is_loading_model = false;
        });
        info!(
            generation = guard.generation(),
            language = subject.language(),
            "forecast published"
        );
        true
    }

    /// Re-issue the last subject in the current display language, but only
    /// when that language differs from the one requested last: the running
    /// request if there is one, otherwise the last completed one.
    pub fn refresh_if_language_changed(self: &Arc<Self>) -> bool {
        let current = self.current_language_code();
        let subject = {
            let inner = self.inner.lock();
            let Some(subject) = inner.subject.clone() else {
                return false;
            };
            let reference = inner
                .in_flight_language
                .clone()
                .or_else(|| inner.last_completed_language.clone());
            if reference.as_deref() == Some(current.as_str()) {
                return false;
            }
            subject
        };
        info!(language = %current, "display language changed, regenerating");
        self.refresh(subject.with_language(&current));
        true
    }

    pub fn is_loading_forecast(&self) -> bool {
        self.state.borrow().is_loading_forecast
    }

    pub fn is_loading_model(&self) -> bool {
        self.state.borrow().is_loading_model
    }

    pub fn horoscope(&self) -> Option<Horoscope> {
        self.state.borrow().horoscope.clone()
    }

    pub fn state(&self) -> ForecastState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ForecastState> {
        self.state.subscribe()
    }

    /// Stop the running generation without publishing anything.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        self.generations.cancel_all();
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.in_flight_language = None;
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::cache::{BoundedCache, MemoryCacheStore, FORECAST_NAMESPACE, TRANSLATION_NAMESPACE};
    use crate::config::PipelineConfig;
    use crate::generate::GenerationClient;
    use crate::locale::LocaleTable;
    use crate::metrics::MetricsRegistry;
    use crate::subject::ZodiacSign;
    use crate::translate::ForecastTranslator;

    fn coordinator() -> Arc<ForecastCoordinator> {
        let store = Arc::new(MemoryCacheStore::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let translator = ForecastTranslator::new(
            None,
            Arc::new(BoundedCache::new(TRANSLATION_NAMESPACE, 4, store.clone())),
            Arc::clone(&metrics),
        );
        let orchestrator = ForecastOrchestrator::new(
            GenerationClient::unavailable(),
            translator,
            Arc::new(BoundedCache::new(FORECAST_NAMESPACE, 4, store)),
            Arc::new(LocaleTable::builtin()),
            PipelineConfig::default(),
            metrics,
        );
        ForecastCoordinator::new(Arc::new(orchestrator), Arc::new(FixedLanguage::new("en")))
    }

    fn subject() -> ForecastSubject {
        ForecastSubject::new(Uuid::nil(), ZodiacSign::Leo, ZodiacSign::Pisces, 42, 2026, "en")
    }

    #[test]
    fn finished_run_of_a_stale_generation_is_discarded() {
        let coordinator = coordinator();
        let stale = coordinator.generations.cancel_and_advance();
        let current = coordinator.generations.cancel_and_advance();

        assert!(!coordinator.publish(&stale, &subject(), Some("Stale week.".into())));
        assert!(coordinator.horoscope().is_none());
        assert!(coordinator.inner.lock().last_completed_language.is_none());

        assert!(coordinator.publish(&current, &subject(), Some("Fresh week.".into())));
        assert_eq!(coordinator.horoscope().unwrap().text(), "Fresh week.");
        assert_eq!(coordinator.inner.lock().last_completed_language.as_deref(), Some("en"));
    }

    #[test]
    fn cancelled_generation_is_discarded() {
        let coordinator = coordinator();
        let guard = coordinator.generations.cancel_and_advance();
        coordinator.cancel();

        assert!(!coordinator.publish(&guard, &subject(), Some("Late week.".into())));
        assert!(coordinator.horoscope().is_none());
    }

    #[test]
    fn locale_suffixes_are_stripped() {
        assert_eq!(strip_locale_suffix("de_DE.UTF-8"), "de_DE");
        assert_eq!(strip_locale_suffix("ca_ES@valencia"), "ca_ES");
        assert_eq!(strip_locale_suffix("ja"), "ja");
    }

    #[test]
    fn fixed_language_can_change() {
        let language = FixedLanguage::new("es-ES");
        assert_eq!(language.current_language(), "es-ES");
        language.set("fr_CA");
        assert_eq!(normalize_language_code(&language.current_language()), "fr");
    }
}
