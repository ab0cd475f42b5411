//! Wire types for the bootstrap endpoints.
//!
//! Status responses serialize the job record directly (see
//! [`crate::job_store::BootstrapJob`]); there is no separate view type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use semgraph_core::block::Block;

/// `POST /semantic-graph/bootstrap` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct StartBootstrapRequest {
    pub document_id: String,
    /// The document's content blocks in order.
    pub blocks: Vec<Block>,
    /// Optional text-model override for this job.
    #[serde(default)]
    pub model: Option<String>,
}

/// `POST /semantic-graph/bootstrap` response body.
#[derive(Debug, Clone, Serialize)]
pub struct StartBootstrapResponse {
    pub job_id: Uuid,
}
