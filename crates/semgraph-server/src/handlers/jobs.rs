//! Bootstrap job handlers.

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::job_store::BootstrapJob;
use crate::runner::JobContext;
use crate::schema::jobs::{StartBootstrapRequest, StartBootstrapResponse};
use crate::state::AppState;

/// `POST /semantic-graph/bootstrap`
///
/// Validates the request, registers the job, spawns the pipeline and
/// returns immediately. The returned id is pollable before the background
/// task has made any progress.
pub async fn start_bootstrap(
    State(state): State<AppState>,
    Json(req): Json<StartBootstrapRequest>,
) -> Result<Json<StartBootstrapResponse>, ApiError> {
    if req.document_id.trim().is_empty() {
        return Err(ApiError::BadRequest("document_id must not be empty".to_string()));
    }
    if req.blocks.is_empty() {
        return Err(ApiError::BadRequest(
            "blocks must contain at least one content block".to_string(),
        ));
    }
    if let Some(block) = req.blocks.iter().find(|b| b.id.trim().is_empty()) {
        return Err(ApiError::BadRequest(format!(
            "every block needs a non-empty id (offending text starts {:?})",
            block.text.chars().take(32).collect::<String>()
        )));
    }

    let job = state.job_store.create(&req.document_id, req.blocks.len());
    let ctx = JobContext {
        job_id: job.job_id,
        document_id: req.document_id,
        blocks: req.blocks,
        chunking: state.chunking,
        extraction: state.extraction_for_job(req.model.as_deref()),
        embeddings: state.embeddings.clone(),
        embedding_cache: state.embedding_cache.clone(),
        documents: state.documents.clone(),
    };
    state.runner.start(state.job_store.clone(), ctx);

    Ok(Json(StartBootstrapResponse { job_id: job.job_id }))
}

/// `GET /semantic-graph/jobs/{job_id}`
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<BootstrapJob>, ApiError> {
    let parsed = Uuid::parse_str(&job_id).map_err(|_| {
        ApiError::BadRequest(format!("invalid job id '{}': expected UUID", job_id))
    })?;

    let job = state
        .job_store
        .get(parsed)
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", parsed)))?;

    Ok(Json(job))
}
