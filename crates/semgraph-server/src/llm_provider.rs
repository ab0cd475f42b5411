//! OpenAI-compatible provider client for the text and embedding models.
//!
//! One [`OpenAiCompatClient`] implements both collaborator traits: chat
//! completions in JSON mode for extraction/canonicalization, and the
//! `/embeddings` endpoint for vectors. Supported providers are `openrouter`
//! (with its default base URL) and `openai_compatible` (base URL required).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use semgraph_pipeline::provider::{EmbeddingProvider, ExtractionProvider, ProviderError};

/// Model-provider settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Provider key: `openrouter` or `openai_compatible`.
    pub provider: String,
    /// Base URL for OpenAI-compatible endpoints. Required for
    /// `openai_compatible`; defaults to openrouter's URL otherwise.
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    /// Chat model used for extraction and canonicalization.
    pub model: String,
    /// Model used for the embeddings endpoint.
    pub embedding_model: String,
}

impl ModelConfig {
    /// Returns a copy with the chat model overridden (per-job override).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

/// Reqwest-backed client for OpenAI-compatible chat and embedding APIs.
pub struct OpenAiCompatClient {
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(config: ModelConfig) -> Self {
        OpenAiCompatClient {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> Result<String, ProviderError> {
        match self.config.provider.as_str() {
            "openrouter" => Ok(self
                .config
                .api_base_url
                .clone()
                .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string())),
            "openai_compatible" => self.config.api_base_url.clone().ok_or_else(|| {
                ProviderError::Request(
                    "openai_compatible provider requires an api_base_url".to_string(),
                )
            }),
            other => Err(ProviderError::Request(format!(
                "unsupported provider '{other}': use openrouter or openai_compatible"
            ))),
        }
    }

    async fn post_json(&self, endpoint: String, body: Value) -> Result<String, ProviderError> {
        let api_key = self.config.api_key.clone().unwrap_or_default();
        let mut req = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body);

        if self.config.provider == "openrouter" {
            req = req
                .header("HTTP-Referer", "https://localhost:3000")
                .header("X-Title", "semgraph bootstrap");
        }

        let response = req
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }
        Ok(body_text)
    }

    /// Runs one chat completion in JSON mode and returns the assistant
    /// content as raw text.
    async fn chat_json(
        &self,
        system_prompt: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let base_url = self.base_url()?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.config.model,
            "temperature": temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message }
            ]
        });

        let body_text = self.post_json(endpoint, body).await?;

        let parsed: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|err| ProviderError::Decode(format!("chat response parse failed: {err}")))?;

        parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::Decode("chat response missing assistant content".to_string())
            })
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiCompatClient {
    async fn extract(
        &self,
        system_prompt: &str,
        payload: &Value,
        temperature: f32,
    ) -> Result<Value, ProviderError> {
        let user_message = payload.to_string();
        let content = self.chat_json(system_prompt, &user_message, temperature).await?;
        serde_json::from_str(&content)
            .map_err(|err| ProviderError::Decode(format!("assistant content was not JSON: {err}")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let base_url = self.base_url()?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let body_text = self.post_json(endpoint, body).await?;

        let parsed: EmbeddingsResponse = serde_json::from_str(&body_text).map_err(|err| {
            ProviderError::Decode(format!("embeddings response parse failed: {err}"))
        })?;

        // Some providers reorder; `index` is authoritative.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsDatum {
    index: usize,
    embedding: Vec<f32>,
}
