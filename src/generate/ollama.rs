//! Local model server client (Ollama HTTP API).
//! Connection pooling via reqwest, manual NDJSON stream parsing, cancellation
//! checked between chunks.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{GenerationRequest, TextGenerator};
use crate::config::ModelConfig;
use crate::error::GenerateError;

pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &ModelConfig) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn installed_models(&self) -> Result<Vec<String>, GenerateError> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GenerateError::Status {
                status: resp.status().as_u16(),
                body: String::new(),
            });
        }
        let tags: TagsResponse = resp.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn is_available(&self) -> bool {
        match self.installed_models().await {
            Ok(models) => {
                let found = models.iter().any(|name| model_matches(name, &self.model));
                if !found {
                    warn!(model = %self.model, "model not installed on server");
                }
                found
            }
            Err(e) => {
                debug!(error = %e, "model server unreachable");
                false
            }
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError> {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": true,
            "options": {
                "num_predict": request.max_tokens,
                "temperature": request.temperature
            }
        });
        if let Some(system) = &request.system {
            body["system"] = serde_json::Value::String(system.clone());
        }

        let response = tokio::select! {
            resp = self.http.post(format!("{}/api/generate", self.base_url)).json(&body).send() => resp?,
            _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerateError::Status {
                status,
                body: body_text.chars().take(200).collect(),
            });
        }

        let mut full_text = String::new();
        let mut stream = response.bytes_stream();
        // NDJSON line buffer for partial lines across chunks
        let mut line_buf: Vec<u8> = Vec::new();

        while let Some(chunk_result) = tokio::select! {
            chunk = stream.next() => chunk,
            _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
        } {
            line_buf.extend_from_slice(&chunk_result?);

            while let Some(newline_pos) = line_buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = line_buf.drain(..=newline_pos).collect();
                if apply_stream_line(&String::from_utf8_lossy(&line), &mut full_text)? {
                    return Ok(full_text);
                }
            }
        }

        // Stream closed without a trailing newline
        if !line_buf.is_empty() {
            apply_stream_line(&String::from_utf8_lossy(&line_buf), &mut full_text)?;
        }
        Ok(full_text)
    }
}

/// Append one NDJSON line's delta to `out`. Returns whether the stream is done.
fn apply_stream_line(line: &str, out: &mut String) -> Result<bool, GenerateError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    let chunk: StreamChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(GenerateError::Model(error));
    }
    out.push_str(&chunk.response);
    Ok(chunk.done)
}

/// `llama3` matches the server's `llama3:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted))
}

// --- Response types ---

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}
