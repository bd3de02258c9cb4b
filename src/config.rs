//! Runtime configuration: reference defaults, overridable from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Local model server connection.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Per-request ceiling enforced by the HTTP client, independent of the
    /// pipeline's own generation budget.
    pub request_timeout: Duration,
}

/// Pipeline budgets and limits.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub generation_timeout: Duration,
    pub translation_timeout: Duration,
    pub max_words: usize,
    pub first_attempt_tokens: u32,
    pub retry_tokens: u32,
    /// Language the generation phase is considered to produce; any other
    /// display language goes through translation.
    pub base_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(180),
            translation_timeout: Duration::from_secs(20),
            max_words: 200,
            first_attempt_tokens: 280,
            retry_tokens: 320,
            base_language: "en".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub forecast_capacity: usize,
    pub translation_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct ForecastConfig {
    pub data_dir: PathBuf,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    /// Language codes the translation backend can produce.
    pub translation_languages: Vec<String>,
    /// JSON file layered over the built-in locale tables.
    pub locale_file: Option<PathBuf>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            model: ModelConfig {
                base_url: "http://127.0.0.1:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                request_timeout: Duration::from_secs(240),
            },
            pipeline: PipelineConfig::default(),
            cache: CacheConfig {
                forecast_capacity: 200,
                translation_capacity: 400,
            },
            translation_languages: ["en", "es", "ca", "fr", "de", "pt", "it", "ja", "zh", "ru"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            locale_file: None,
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let translation_languages = env::var("ASTROGLASS_TRANSLATION_LANGUAGES")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|langs| !langs.is_empty())
            .unwrap_or(defaults.translation_languages);

        Self {
            data_dir: env::var("ASTROGLASS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            model: ModelConfig {
                base_url: env::var("ASTROGLASS_MODEL_URL").unwrap_or(defaults.model.base_url),
                model: env::var("ASTROGLASS_MODEL").unwrap_or(defaults.model.model),
                request_timeout: defaults.model.request_timeout,
            },
            pipeline: PipelineConfig {
                generation_timeout: env_secs("ASTROGLASS_GENERATION_TIMEOUT_SECS")
                    .unwrap_or(defaults.pipeline.generation_timeout),
                translation_timeout: env_secs("ASTROGLASS_TRANSLATION_TIMEOUT_SECS")
                    .unwrap_or(defaults.pipeline.translation_timeout),
                max_words: env_parse("ASTROGLASS_MAX_WORDS").unwrap_or(defaults.pipeline.max_words),
                ..defaults.pipeline
            },
            cache: CacheConfig {
                forecast_capacity: env_parse("ASTROGLASS_FORECAST_CACHE_CAPACITY")
                    .unwrap_or(defaults.cache.forecast_capacity),
                translation_capacity: env_parse("ASTROGLASS_TRANSLATION_CACHE_CAPACITY")
                    .unwrap_or(defaults.cache.translation_capacity),
            },
            translation_languages,
            locale_file: env::var("ASTROGLASS_LOCALE_FILE").ok().map(PathBuf::from),
        }
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("forecast_cache.sqlite3")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = ForecastConfig::default();
        assert_eq!(config.pipeline.generation_timeout, Duration::from_secs(180));
        assert_eq!(config.pipeline.translation_timeout, Duration::from_secs(20));
        assert_eq!(config.pipeline.max_words, 200);
        assert_eq!(config.pipeline.first_attempt_tokens, 280);
        assert_eq!(config.pipeline.retry_tokens, 320);
        assert_eq!(config.cache.forecast_capacity, 200);
        assert_eq!(config.cache.translation_capacity, 400);
        assert_eq!(config.pipeline.base_language, "en");
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars = [
            ("ASTROGLASS_DATA_DIR", "/var/lib/astroglass"),
            ("ASTROGLASS_MODEL", "qwen2.5:7b"),
            ("ASTROGLASS_GENERATION_TIMEOUT_SECS", " 90 "),
            ("ASTROGLASS_MAX_WORDS", "not-a-number"),
            ("ASTROGLASS_FORECAST_CACHE_CAPACITY", "50"),
            ("ASTROGLASS_TRANSLATION_LANGUAGES", "FR, de,,"),
            ("ASTROGLASS_LOCALE_FILE", "/etc/astroglass/locale.json"),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let config = ForecastConfig::from_env();
        for (key, _) in vars {
            env::remove_var(key);
        }

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/astroglass"));
        assert_eq!(config.model.model, "qwen2.5:7b");
        assert_eq!(config.pipeline.generation_timeout, Duration::from_secs(90));
        assert_eq!(config.pipeline.translation_timeout, Duration::from_secs(20));
        assert_eq!(config.pipeline.max_words, 200);
        assert_eq!(config.pipeline.retry_tokens, 320);
        assert_eq!(config.cache.forecast_capacity, 50);
        assert_eq!(config.cache.translation_capacity, 400);
        assert_eq!(config.translation_languages, ["fr", "de"]);
        assert_eq!(
            config.locale_file,
            Some(PathBuf::from("/etc/astroglass/locale.json"))
        );
    }

    #[test]
    fn cache_db_lives_in_data_dir() {
        let mut config = ForecastConfig::default();
        config.data_dir = PathBuf::from("/tmp/astro");
        assert_eq!(
            config.cache_db_path(),
            PathBuf::from("/tmp/astro/forecast_cache.sqlite3")
        );
    }
}
