//! AstroGlass forecast pipeline: weekly horoscope text generated on-device,
//! bounded in time, validated, translated, and cached.
//! Main library: module layout and the composition root.

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod generate;
pub mod locale;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod sanitize;
pub mod state_machine;
pub mod subject;
pub mod timeout;
pub mod translate;

use std::sync::Arc;

use tracing::{info, warn};

pub use cache::{BoundedCache, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use config::ForecastConfig;
pub use coordinator::{EnvLanguage, FixedLanguage, ForecastCoordinator, ForecastState, LanguageProvider};
pub use generate::{GenerationClient, OllamaGenerator, TextGenerator};
pub use locale::LocaleTable;
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use orchestrator::ForecastOrchestrator;
pub use subject::{ForecastProfile, ForecastSubject, Horoscope, ZodiacSign};
pub use translate::{ForecastTranslator, LlmTranslator, TranslationBackend};

use cache::{FORECAST_NAMESPACE, TRANSLATION_NAMESPACE};
use error::StoreError;

/// Collaborators the runtime is assembled from.
pub struct Backends {
    pub store: Arc<dyn CacheStore>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub translation: Option<Arc<dyn TranslationBackend>>,
    pub language: Arc<dyn LanguageProvider>,
    pub locale: LocaleTable,
}

/// Process-lifetime owner of the caches, orchestrator and coordinator.
pub struct ForecastRuntime {
    config: ForecastConfig,
    metrics: Arc<MetricsRegistry>,
    forecast_cache: Arc<BoundedCache>,
    translation_cache: Arc<BoundedCache>,
    orchestrator: Arc<ForecastOrchestrator>,
    coordinator: Arc<ForecastCoordinator>,
}

impl ForecastRuntime {
    /// Wire the default stack: SQLite cache in `data_dir`, local model server
    /// for generation and translation, locale from the environment.
    /// Only failure to create `data_dir` is an error; every other missing
    /// piece degrades.
    pub fn open(config: ForecastConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db_path = config.cache_db_path();
        let store: Arc<dyn CacheStore> = match SqliteCacheStore::open(&db_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "cache database unavailable, caching in memory only");
                Arc::new(MemoryCacheStore::new())
            }
        };

        let generator: Option<Arc<dyn TextGenerator>> = match OllamaGenerator::new(&config.model) {
            Ok(generator) => {
                info!(model = %generator.model(), url = %config.model.base_url, "model client initialized");
                Some(Arc::new(generator))
            }
            Err(e) => {
                warn!(error = %e, "model client init failed, generation disabled");
                None
            }
        };

        let translation = generator.as_ref().map(|generator| {
            Arc::new(LlmTranslator::new(
                Arc::clone(generator),
                &config.translation_languages,
            )) as Arc<dyn TranslationBackend>
        });

        let locale = match &config.locale_file {
            Some(path) => LocaleTable::with_overrides_from_file(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "locale overrides load failed, using built-in tables");
                LocaleTable::builtin()
            }),
            None => LocaleTable::builtin(),
        };

        let backends = Backends {
            store,
            generator,
            translation,
            language: Arc::new(EnvLanguage),
            locale,
        };
        Ok(Self::with_backends(config, backends))
    }

    pub fn with_backends(config: ForecastConfig, backends: Backends) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let forecast_cache = Arc::new(BoundedCache::new(
            FORECAST_NAMESPACE,
            config.cache.forecast_capacity,
            Arc::clone(&backends.store),
        ));
        let translation_cache = Arc::new(BoundedCache::new(
            TRANSLATION_NAMESPACE,
            config.cache.translation_capacity,
            Arc::clone(&backends.store),
        ));

        let generation = match backends.generator {
            Some(generator) => GenerationClient::new(generator),
            None => GenerationClient::unavailable(),
        };
        let translator = ForecastTranslator::new(
            backends.translation,
            Arc::clone(&translation_cache),
            Arc::clone(&metrics),
        )
        .with_source_language(&config.pipeline.base_language);

        let orchestrator = Arc::new(ForecastOrchestrator::new(
            generation,
            translator,
            Arc::clone(&forecast_cache),
            Arc::new(backends.locale),
            config.pipeline.clone(),
            Arc::clone(&metrics),
        ));
        let coordinator = ForecastCoordinator::new(Arc::clone(&orchestrator), backends.language);

        info!(
            forecast_entries = forecast_cache.len(),
            translation_entries = translation_cache.len(),
            "forecast runtime ready"
        );

        Self {
            config,
            metrics,
            forecast_cache,
            translation_cache,
            orchestrator,
            coordinator,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Latency percentiles and outcome counters since startup.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn forecast_cache(&self) -> &Arc<BoundedCache> {
        &self.forecast_cache
    }

    pub fn translation_cache(&self) -> &Arc<BoundedCache> {
        &self.translation_cache
    }

    pub fn orchestrator(&self) -> &Arc<ForecastOrchestrator> {
        &self.orchestrator
    }

    pub fn coordinator(&self) -> &Arc<ForecastCoordinator> {
        &self.coordinator
    }
}
