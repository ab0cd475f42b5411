//! Collaborator traits for the text and embedding models.
//!
//! Implementations live at the edge (the server crate provides an
//! OpenAI-compatible HTTP client); tests inject counting mocks. All output
//! crossing these traits is untrusted JSON and must be schema-validated by
//! the caller before use.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failures from a model collaborator (network, quota, undecodable output).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or the response body not read.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response arrived but could not be decoded into the expected shape.
    #[error("provider response decode failed: {0}")]
    Decode(String),
}

/// The text model used for per-chunk extraction and the global merge pass.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Sends one structured-output request and returns the raw JSON payload
    /// from the assistant content. The payload is untrusted.
    async fn extract(
        &self,
        system_prompt: &str,
        payload: &Value,
        temperature: f32,
    ) -> Result<Value, ProviderError>;
}

/// The embedding model. Output vectors are aligned to the input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}
