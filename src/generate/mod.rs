//! Text generation. `TextGenerator` is the model capability seam;
//! `GenerationClient` is the total wrapper the pipeline calls.

pub mod ollama;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GenerateError;

pub use ollama::OllamaGenerator;

pub const MIN_TOKENS: u32 = 64;
pub const MAX_TOKENS: u32 = 320;
pub const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens,
            temperature: TEMPERATURE,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Whether the model can serve requests right now.
    async fn is_available(&self) -> bool;

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError>;
}

/// Never fails outward: every failure mode collapses to `None`.
#[derive(Clone)]
pub struct GenerationClient {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Client with no model behind it. Every call returns `None`.
    pub fn unavailable() -> Self {
        Self { generator: None }
    }

    pub fn generator(&self) -> Option<&Arc<dyn TextGenerator>> {
        self.generator.as_ref()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let start = Instant::now();
        match self.try_generate(prompt, max_tokens, cancel).await {
            Ok(text) if text.is_empty() => {
                debug!("generation returned no text");
                None
            }
            Ok(text) => {
                debug!(
                    chars = text.chars().count(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "generation finished"
                );
                Some(text)
            }
            Err(GenerateError::Cancelled) => {
                debug!("generation cancelled");
                None
            }
            Err(e @ GenerateError::Unavailable(_)) => {
                debug!(error = %e, "generation skipped");
                None
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                None
            }
        }
    }

    /// Trimmed model output, with the budget clamped to [`MIN_TOKENS`, `MAX_TOKENS`].
    pub async fn try_generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| GenerateError::Unavailable("no text generator configured".into()))?;
        if !generator.is_available().await {
            return Err(GenerateError::Unavailable("model is not ready".into()));
        }

        let request = GenerationRequest::new(prompt, max_tokens.clamp(MIN_TOKENS, MAX_TOKENS));
        let text = generator.generate(&request, cancel).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    struct Scripted {
        available: bool,
        reply: Result<&'static str, ()>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(available: bool, reply: Result<&'static str, ()>) -> Arc<Self> {
            Arc::new(Self {
                available,
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
            _cancel: &CancellationToken,
        ) -> Result<String, GenerateError> {
            self.requests.lock().push(request.clone());
            self.reply
                .map(str::to_string)
                .map_err(|_| GenerateError::Model("scripted failure".into()))
        }
    }

    #[tokio::test]
    async fn missing_backend_yields_none() {
        let client = GenerationClient::unavailable();
        assert!(client.generate("p", 280, &CancellationToken::new()).await.is_none());
    }

    #[tokio::test]
    async fn unavailable_backend_is_not_called() {
        let gen = Scripted::new(false, Ok("text"));
        let client = GenerationClient::new(gen.clone());
        let cancel = CancellationToken::new();
        assert!(client.generate("p", 280, &cancel).await.is_none());
        assert!(matches!(
            client.try_generate("p", 280, &cancel).await,
            Err(GenerateError::Unavailable(_))
        ));
        assert!(matches!(
            GenerationClient::unavailable().try_generate("p", 280, &cancel).await,
            Err(GenerateError::Unavailable(_))
        ));
        assert!(gen.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn errors_and_blank_output_yield_none() {
        let cancel = CancellationToken::new();
        let failing = GenerationClient::new(Scripted::new(true, Err(())));
        assert!(failing.generate("p", 280, &cancel).await.is_none());

        let blank = GenerationClient::new(Scripted::new(true, Ok("  \n ")));
        assert!(blank.generate("p", 280, &cancel).await.is_none());
    }

    #[tokio::test]
    async fn output_is_trimmed_and_budget_clamped() {
        let gen = Scripted::new(true, Ok("  A calm week.\n"));
        let client = GenerationClient::new(gen.clone());
        let cancel = CancellationToken::new();

        assert_eq!(client.generate("p", 1000, &cancel).await.as_deref(), Some("A calm week."));
        client.generate("p", 10, &cancel).await;
        client.generate("p", 280, &cancel).await;

        let budgets: Vec<u32> = gen.requests.lock().iter().map(|r| r.max_tokens).collect();
        assert_eq!(budgets, [MAX_TOKENS, MIN_TOKENS, 280]);
        assert!(gen.requests.lock().iter().all(|r| r.temperature == TEMPERATURE));
    }
}
