//! The semantic graph construction pipeline.
//!
//! Stages, in job order:
//! 1. [`chunker`]: token-budgeted, overlapping chunking of content blocks.
//! 2. [`extraction`]: one collaborator call per chunk, producing a
//!    schema-validated mini graph with chunk-stable node identity.
//! 3. [`canonicalize`]: one global collaborator call merging all mini
//!    graphs into the canonical document graph.
//! 4. [`embeddings`]: content-addressed embedding cache fill for the
//!    canonical nodes.
//!
//! Collaborators (text model, embedding model) are injected through the
//! traits in [`provider`]; their output is always treated as untrusted and
//! evaluated into a tagged parsed/rejected outcome before use.

pub mod canonicalize;
pub mod chunker;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod provider;

pub use error::{PipelineError, SchemaIssue, SchemaRejection};
pub use provider::{EmbeddingProvider, ExtractionProvider, ProviderError};
