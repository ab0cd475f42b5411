//! In-process registry of bootstrap jobs.
//!
//! [`JobStore`] is an explicit service object injected through `AppState`
//! (no module-level global). Structurally, only the background task spawned
//! for a job ever mutates its record; handlers only insert (on create) and
//! read. The store enforces the observable guarantees regardless: stages
//! only move forward, `done_blocks` never decreases, and terminal records
//! are never overwritten. Records are kept indefinitely: there is no
//! cleanup, so a failed or finished job stays queryable.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

pub type JobId = Uuid;

/// Pipeline stage of a bootstrap job.
///
/// Lifecycle: `nodes -> edges -> persist -> done`, with `error` reachable
/// from any non-terminal stage. `done` and `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Nodes,
    Edges,
    Persist,
    Done,
    Error,
}

impl JobStage {
    /// Forward-progress rank; `error` sits outside the ladder and is only
    /// entered through [`JobStore::fail`].
    pub fn rank(self) -> u8 {
        match self {
            JobStage::Nodes => 0,
            JobStage::Edges => 1,
            JobStage::Persist => 2,
            JobStage::Done => 3,
            JobStage::Error => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Error)
    }
}

/// The queryable record of one bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapJob {
    pub job_id: JobId,
    pub document_id: String,
    pub stage: JobStage,
    pub done_blocks: usize,
    pub total_blocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent registry of bootstrap jobs.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<JobId, BootstrapJob>,
}

impl JobStore {
    pub fn new() -> Self {
        JobStore::default()
    }

    /// Creates a job record in stage `nodes` with zero progress.
    pub fn create(&self, document_id: &str, total_blocks: usize) -> BootstrapJob {
        let now = Utc::now();
        let job = BootstrapJob {
            job_id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            stage: JobStage::Nodes,
            done_blocks: 0,
            total_blocks,
            node_count: None,
            edge_count: None,
            error: None,
            started_at: now,
            updated_at: now,
        };
        self.jobs.insert(job.job_id, job.clone());
        job
    }

    /// Pure read; never blocks on pipeline work.
    pub fn get(&self, job_id: JobId) -> Option<BootstrapJob> {
        self.jobs.get(&job_id).map(|entry| entry.clone())
    }

    /// Records per-chunk progress: `done_blocks` advances to the chunk's
    /// end index (monotonically) and the running mini node/edge counts are
    /// refreshed.
    pub fn record_chunk_progress(
        &self,
        job_id: JobId,
        done_blocks: usize,
        node_count: usize,
        edge_count: usize,
    ) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.stage.is_terminal() {
                return;
            }
            job.done_blocks = job.done_blocks.max(done_blocks);
            job.node_count = Some(node_count);
            job.edge_count = Some(edge_count);
            job.updated_at = Utc::now();
        }
    }

    /// Advances the stage, ignoring anything that is not forward progress.
    pub fn advance_stage(&self, job_id: JobId, stage: JobStage) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.stage.is_terminal() || stage.rank() <= job.stage.rank() {
                return;
            }
            job.stage = stage;
            job.updated_at = Utc::now();
        }
    }

    /// Marks the job done with final canonical counts and full progress.
    pub fn complete(&self, job_id: JobId, node_count: usize, edge_count: usize) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.stage.is_terminal() {
                return;
            }
            job.stage = JobStage::Done;
            job.done_blocks = job.total_blocks;
            job.node_count = Some(node_count);
            job.edge_count = Some(edge_count);
            job.updated_at = Utc::now();
        }
    }

    /// Marks the job failed with a human-readable message. No-op on
    /// terminal records.
    pub fn fail(&self, job_id: JobId, message: String) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.stage.is_terminal() {
                return;
            }
            job.stage = JobStage::Error;
            job.error = Some(message);
            job.updated_at = Utc::now();
        }
    }
}
