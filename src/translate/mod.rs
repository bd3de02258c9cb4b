//! Translation with graceful fallback.
//! `ForecastTranslator::translate` is total: every failure path returns the
//! input text unchanged, and only real translations are cached.

pub mod llm;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::BoundedCache;
use crate::error::TranslateError;
use crate::metrics::{metric_names, MetricsRegistry};

pub use llm::LlmTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageAvailability {
    /// Ready to translate now.
    Installed,
    /// Translatable, possibly after a model download.
    Supported,
    Unsupported,
}

impl LanguageAvailability {
    pub fn is_usable(self) -> bool {
        matches!(self, LanguageAvailability::Installed | LanguageAvailability::Supported)
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn availability(&self, source: &str, target: &str) -> LanguageAvailability;

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TranslateError>;
}

/// `es_ES` → `es-es`.
pub fn normalize_target(target: &str) -> String {
    target.trim().replace('_', "-").to_lowercase()
}

/// Hex blake3 digest of the source text.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

pub fn translation_cache_key(target: &str, text: &str) -> String {
    format!("{}|{}", target, content_hash(text))
}

/// Detects the dominant language of `text` using whatlang.
/// Returns an ISO 639-1 code or None if detection is unreliable.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    lang_to_code(info.lang())
}

fn lang_to_code(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang::*;
    let code = match lang {
        Eng => "en",
        Spa => "es",
        Cat => "ca",
        Fra => "fr",
        Deu => "de",
        Por => "pt",
        Ita => "it",
        Tgl => "fil",
        Hin => "hi",
        Jpn => "ja",
        Rus => "ru",
        Cmn => "zh",
        Afr => "af",
        Nld => "nl",
        Kor => "ko",
        Ukr => "uk",
        Pol => "pl",
        Tur => "tr",
        _ => return None,
    };
    Some(code)
}

pub struct ForecastTranslator {
    backend: Option<Arc<dyn TranslationBackend>>,
    cache: Arc<BoundedCache>,
    metrics: Arc<MetricsRegistry>,
    source_language: String,
}

impl ForecastTranslator {
    pub fn new(
        backend: Option<Arc<dyn TranslationBackend>>,
        cache: Arc<BoundedCache>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            backend,
            cache,
            metrics,
            source_language: "en".to_string(),
        }
    }

    pub fn with_source_language(mut self, language: &str) -> Self {
        self.source_language = normalize_target(language);
        self
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Translate `text` into `target`, or return `text` unchanged.
    pub async fn translate(&self, text: &str, target: &str, cancel: &CancellationToken) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let target = normalize_target(target);
        if target.starts_with(self.source_language.as_str()) {
            self.metrics.increment(metric_names::TRANSLATION_SKIPPED);
            return text.to_string();
        }

        let key = translation_cache_key(&target, text);
        if let Some(cached) = self.cache.get(&key) {
            debug!(target = %target, "translation cache hit");
            return cached;
        }

        let primary = target.split('-').next().unwrap_or(target.as_str());
        if detect_language(text) == Some(primary) {
            debug!(target = %target, "text already in target language");
            self.metrics.increment(metric_names::TRANSLATION_SKIPPED);
            return text.to_string();
        }

        let Some(backend) = &self.backend else {
            debug!("no translation backend configured");
            return text.to_string();
        };

        let span = self.metrics.span(metric_names::TRANSLATE);
        let result = if backend
            .availability(&self.source_language, &target)
            .await
            .is_usable()
        {
            backend
                .translate(text, &self.source_language, &target, cancel)
                .await
        } else {
            Err(TranslateError::Unsupported {
                source_lang: self.source_language.clone(),
                target_lang: target.clone(),
            })
        };
        let elapsed_ms = span.finish();

        match result {
            Ok(translated) if !translated.trim().is_empty() => {
                let translated = translated.trim().to_string();
                debug!(target = %target, elapsed_ms, "translation finished");
                self.cache.set(&key, &translated);
                translated
            }
            Ok(_) => {
                warn!(target = %target, "translation returned empty text");
                text.to_string()
            }
            Err(TranslateError::Cancelled) => text.to_string(),
            Err(e @ TranslateError::Unsupported { .. }) => {
                debug!(error = %e, "translation skipped");
                text.to_string()
            }
            Err(e) => {
                warn!(target = %target, error = %e, "translation failed");
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::cache::{MemoryCacheStore, TRANSLATION_NAMESPACE};
    use crate::locale::LocaleTable;

    const ENGLISH: &str = "This week works best when you cut noise early and set clear priorities from day one.";

    struct Scripted {
        availability: LanguageAvailability,
        reply: Result<&'static str, ()>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(availability: LanguageAvailability, reply: Result<&'static str, ()>) -> Arc<Self> {
            Arc::new(Self {
                availability,
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TranslationBackend for Scripted {
        async fn availability(&self, _source: &str, _target: &str) -> LanguageAvailability {
            self.availability
        }

        async fn translate(
            &self,
            _text: &str,
            source: &str,
            target: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, TranslateError> {
            self.calls.lock().push((source.to_string(), target.to_string()));
            self.reply
                .map(str::to_string)
                .map_err(|_| TranslateError::Backend("scripted failure".into()))
        }
    }

    fn translator(backend: Arc<Scripted>) -> (ForecastTranslator, Arc<BoundedCache>) {
        let cache = Arc::new(BoundedCache::new(
            TRANSLATION_NAMESPACE,
            8,
            Arc::new(MemoryCacheStore::new()),
        ));
        let translator = ForecastTranslator::new(
            Some(backend as Arc<dyn TranslationBackend>),
            Arc::clone(&cache),
            Arc::new(MetricsRegistry::new()),
        );
        (translator, cache)
    }

    #[tokio::test]
    async fn english_targets_are_identity_without_cache_writes() {
        let backend = Scripted::new(LanguageAvailability::Installed, Ok("nope"));
        let (translator, cache) = translator(backend.clone());
        let cancel = CancellationToken::new();
        for target in ["en", "en_US", "EN-gb"] {
            assert_eq!(translator.translate(ENGLISH, target, &cancel).await, ENGLISH);
        }
        assert!(backend.calls.lock().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_returned_unchanged() {
        let backend = Scripted::new(LanguageAvailability::Installed, Ok("nope"));
        let (translator, _) = translator(backend.clone());
        assert_eq!(translator.translate("  ", "fr", &CancellationToken::new()).await, "  ");
        assert!(backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn success_is_cached_under_normalized_target() {
        let backend = Scripted::new(LanguageAvailability::Supported, Ok(" Cette semaine. "));
        let (translator, cache) = translator(backend.clone());
        let cancel = CancellationToken::new();

        assert_eq!(translator.translate(ENGLISH, "fr_FR", &cancel).await, "Cette semaine.");
        assert_eq!(translator.translate(ENGLISH, "fr-fr", &cancel).await, "Cette semaine.");
        assert_eq!(backend.calls.lock().len(), 1);
        assert_eq!(backend.calls.lock()[0], ("en".to_string(), "fr-fr".to_string()));
        assert!(cache.contains(&translation_cache_key("fr-fr", ENGLISH)));
    }

    #[tokio::test]
    async fn unsupported_pair_returns_input() {
        let backend = Scripted::new(LanguageAvailability::Unsupported, Ok("x"));
        let (translator, cache) = translator(backend.clone());
        assert_eq!(translator.translate(ENGLISH, "af", &CancellationToken::new()).await, ENGLISH);
        assert!(backend.calls.lock().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failures_return_input_and_are_not_cached() {
        let cancel = CancellationToken::new();

        let failing = Scripted::new(LanguageAvailability::Installed, Err(()));
        let (failing_translator, failing_cache) = translator(failing);
        assert_eq!(failing_translator.translate(ENGLISH, "de", &cancel).await, ENGLISH);
        assert!(failing_cache.is_empty());

        let blank = Scripted::new(LanguageAvailability::Installed, Ok("   "));
        let (blank_translator, blank_cache) = translator(blank);
        assert_eq!(blank_translator.translate(ENGLISH, "de", &cancel).await, ENGLISH);
        assert!(blank_cache.is_empty());
    }

    #[tokio::test]
    async fn missing_backend_returns_input() {
        let cache = Arc::new(BoundedCache::new(
            TRANSLATION_NAMESPACE,
            8,
            Arc::new(MemoryCacheStore::new()),
        ));
        let translator = ForecastTranslator::new(None, cache, Arc::new(MetricsRegistry::new()));
        assert_eq!(translator.translate(ENGLISH, "ja", &CancellationToken::new()).await, ENGLISH);
    }

    #[tokio::test]
    async fn text_already_in_target_language_is_not_sent() {
        let spanish = LocaleTable::builtin().fallback_text("es").to_string();
        let backend = Scripted::new(LanguageAvailability::Installed, Ok("x"));
        let (translator, cache) = translator(backend.clone());
        assert_eq!(translator.translate(&spanish, "es", &CancellationToken::new()).await, spanish);
        assert!(backend.calls.lock().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_key_shape() {
        let key = translation_cache_key("pt-br", "hello");
        let (target, hash) = key.split_once('|').unwrap();
        assert_eq!(target, "pt-br");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("hello"));
        assert_eq!(normalize_target(" PT_BR "), "pt-br");
    }
}
