//! Pipeline error types and schema validation structures.

use thiserror::Error;

use crate::provider::ProviderError;

/// One structured validation issue found in a collaborator response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaIssue {
    /// Dotted path of the offending field, when attributable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(field: Option<String>, message: impl Into<String>) -> Self {
        SchemaIssue {
            field,
            message: message.into(),
        }
    }
}

/// A rejected collaborator response: parse failure or semantic violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRejection {
    pub message: String,
    pub issues: Vec<SchemaIssue>,
}

impl SchemaRejection {
    pub fn parse_failure(message: impl Into<String>) -> Self {
        SchemaRejection {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn invalid(issues: Vec<SchemaIssue>) -> Self {
        SchemaRejection {
            message: format!("{} validation issue(s)", issues.len()),
            issues,
        }
    }

    fn describe(&self) -> String {
        if self.issues.is_empty() {
            self.message.clone()
        } else {
            let details = self
                .issues
                .iter()
                .map(|issue| match &issue.field {
                    Some(field) => format!("{}: {}", field, issue.message),
                    None => issue.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!("{} ({})", self.message, details)
        }
    }
}

/// Errors that abort a bootstrap job. No partial graph is ever persisted
/// past one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A model collaborator failed (network, quota, undecodable content).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A collaborator response failed schema validation. Hard failure:
    /// malformed output is never coerced into partial data.
    #[error("invalid {stage} response: {message}")]
    InvalidResponse { stage: &'static str, message: String },

    /// The embedding collaborator returned a misaligned batch.
    #[error("embedding response misaligned: expected {expected} vectors, got {actual}")]
    EmbeddingMismatch { expected: usize, actual: usize },

    /// A storage backend failed.
    #[error(transparent)]
    Storage(#[from] semgraph_storage::StorageError),
}

impl PipelineError {
    pub fn invalid(stage: &'static str, rejection: SchemaRejection) -> Self {
        PipelineError::InvalidResponse {
            stage,
            message: rejection.describe(),
        }
    }
}
