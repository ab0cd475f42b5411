//! Background execution of bootstrap jobs.
//!
//! [`BootstrapRunner`] spawns one detached tokio task per job and keeps
//! the join handles in a registry; a task removes its own handle when it
//! exits. All observable progress goes through the [`JobStore`], so a
//! crash of one job's task leaves its record in whatever stage it last
//! reached. There is no cancellation surface.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{error, info};

use semgraph_core::block::Block;
use semgraph_core::graph::MiniGraph;
use semgraph_pipeline::chunker::{chunk_blocks, ChunkConfig};
use semgraph_pipeline::{canonicalize, embeddings, extraction};
use semgraph_pipeline::{EmbeddingProvider, ExtractionProvider, PipelineError};
use semgraph_storage::{DocumentStore, EmbeddingCacheStore};

use crate::job_store::{JobId, JobStage, JobStore};

/// Actor recorded on graph writes made by this pipeline.
const BOOTSTRAP_ACTOR: &str = "semantic-graph-bootstrap";

/// Everything one job run needs, captured before spawn.
pub struct JobContext {
    pub job_id: JobId,
    pub document_id: String,
    pub blocks: Vec<Block>,
    pub chunking: ChunkConfig,
    pub extraction: Arc<dyn ExtractionProvider>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub embedding_cache: Arc<dyn EmbeddingCacheStore>,
    pub documents: Arc<dyn DocumentStore>,
}

/// Spawns bootstrap pipelines as detached tasks and tracks their handles.
#[derive(Default)]
pub struct BootstrapRunner {
    handles: DashMap<JobId, JoinHandle<()>>,
}

impl BootstrapRunner {
    pub fn new() -> Self {
        BootstrapRunner::default()
    }

    /// Fire-and-forget launch of one job. The task reports its outcome to
    /// the job store and removes its own handle when it exits.
    pub fn start(self: &Arc<Self>, store: Arc<JobStore>, ctx: JobContext) {
        let runner = Arc::clone(self);
        let job_id = ctx.job_id;

        let handle = tokio::spawn(async move {
            match run_bootstrap(&store, &ctx).await {
                Ok((node_count, edge_count)) => {
                    store.complete(job_id, node_count, edge_count);
                    info!(%job_id, node_count, edge_count, "bootstrap job finished");
                }
                Err(err) => {
                    let message = err.to_string();
                    error!(%job_id, error = %message, "bootstrap job failed");
                    store.fail(job_id, message);
                }
            }
            runner.handles.remove(&job_id);
        });

        self.handles.insert(job_id, handle);
    }
}

/// The full pipeline for one document: chunk, extract per chunk, merge
/// globally, embed, persist. Returns the canonical node and edge counts.
async fn run_bootstrap(
    store: &JobStore,
    ctx: &JobContext,
) -> Result<(usize, usize), PipelineError> {
    let chunks = chunk_blocks(&ctx.blocks, &ctx.chunking);
    info!(
        job_id = %ctx.job_id,
        document_id = %ctx.document_id,
        blocks = ctx.blocks.len(),
        chunks = chunks.len(),
        "starting bootstrap pipeline"
    );

    let mut merged = MiniGraph::default();
    for chunk in &chunks {
        let mini = extraction::extract_mini_graph(
            ctx.extraction.as_ref(),
            &chunk.id,
            &ctx.blocks[chunk.start..chunk.end],
        )
        .await?;
        merged.absorb(mini);
        // Overlapping chunks can report the same end twice; the store keeps
        // the maximum.
        store.record_chunk_progress(
            ctx.job_id,
            chunk.end,
            merged.nodes.len(),
            merged.edges.len(),
        );
    }

    store.advance_stage(ctx.job_id, JobStage::Edges);
    let graph = canonicalize::canonicalize(ctx.extraction.as_ref(), &merged).await?;

    store.advance_stage(ctx.job_id, JobStage::Persist);
    embeddings::ensure_embeddings(
        ctx.embedding_cache.as_ref(),
        ctx.embeddings.as_ref(),
        &ctx.document_id,
        &graph.nodes,
    )
    .await?;

    let reason = format!(
        "bootstrap from {} content blocks in {} chunks",
        ctx.blocks.len(),
        chunks.len()
    );
    ctx.documents
        .persist_semantic_graph(&ctx.document_id, &graph, BOOTSTRAP_ACTOR, &reason)?;

    Ok((graph.nodes.len(), graph.edges.len()))
}
