//! Internal failure types. None of these cross the pipeline boundary:
//! every variant is logged and absorbed where it occurs.

use thiserror::Error;

/// Durable cache store failures. A failing store degrades to a cache miss.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Text generation failures. Mapped to "no output" by the generation client.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model stream: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model reported error: {0}")]
    Model(String),

    #[error("generation cancelled")]
    Cancelled,
}

/// Translation failures. Mapped to "untranslated text" by the translator.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("language pair {source_lang} -> {target_lang} not supported")]
    Unsupported {
        source_lang: String,
        target_lang: String,
    },

    #[error("translation backend failed: {0}")]
    Backend(String),

    #[error("translation produced no text")]
    Empty,

    #[error("translation cancelled")]
    Cancelled,
}

/// Locale override file failures. The built-in tables are used instead.
#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("locale table i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("locale table parse failure: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<GenerateError> for TranslateError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::Cancelled => TranslateError::Cancelled,
            other => TranslateError::Backend(other.to_string()),
        }
    }
}
