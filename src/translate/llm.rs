//! Translation backend driven by a text generator.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{LanguageAvailability, TranslationBackend};
use crate::error::TranslateError;
use crate::generate::{GenerationRequest, TextGenerator};

/// System prompt kept under 60 tokens.
const SYSTEM_PROMPT: &str = "You are a translator. Output only the translation, nothing else.";

const TRANSLATION_TEMPERATURE: f32 = 0.1;

pub struct LlmTranslator {
    generator: Arc<dyn TextGenerator>,
    languages: HashSet<String>,
}

impl LlmTranslator {
    /// `languages` are the primary codes the model translates reliably.
    pub fn new(generator: Arc<dyn TextGenerator>, languages: &[String]) -> Self {
        Self {
            generator,
            languages: languages.iter().map(|l| primary_code(l)).collect(),
        }
    }

    fn supports(&self, language: &str) -> bool {
        self.languages.contains(&primary_code(language))
    }
}

#[async_trait]
impl TranslationBackend for LlmTranslator {
    async fn availability(&self, source: &str, target: &str) -> LanguageAvailability {
        if !self.supports(source) || !self.supports(target) {
            return LanguageAvailability::Unsupported;
        }
        if self.generator.is_available().await {
            LanguageAvailability::Installed
        } else {
            LanguageAvailability::Supported
        }
    }

    async fn translate(
        &self,
        text: &str,
        _source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TranslateError> {
        if cancel.is_cancelled() {
            return Err(TranslateError::Cancelled);
        }

        let request = GenerationRequest::new(build_user_prompt(text, target), estimate_max_tokens(text))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(TRANSLATION_TEMPERATURE);
        let output = self.generator.generate(&request, cancel).await?;
        let output = output.trim();
        if output.is_empty() {
            return Err(TranslateError::Empty);
        }
        Ok(output.to_string())
    }
}

fn primary_code(language: &str) -> String {
    language
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Compact user prompt: {"t":"text","l":"lang"}
fn build_user_prompt(text: &str, target_lang: &str) -> String {
    serde_json::json!({ "t": text, "l": target_lang }).to_string()
}

/// Estimate max_tokens: (input_tokens * 1.15 + 32), capped at 768.
fn estimate_max_tokens(text: &str) -> u32 {
    // Rough: ~4 chars/token for Latin, ~1.5 for CJK
    let estimated_input_tokens = text.len() as f64 / 3.0;
    let max = (estimated_input_tokens * 1.15 + 32.0) as u32;
    max.clamp(64, 768)
}
