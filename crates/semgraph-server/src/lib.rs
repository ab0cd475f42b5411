//! HTTP/JSON API server for semantic graph bootstrap jobs.
//!
//! Exposes two endpoints: start a bootstrap job for a document's content
//! blocks, and poll a job's progress. The pipeline itself runs as a
//! detached background task per job; status reads never block and never
//! trigger work.

pub mod error;
pub mod handlers;
pub mod job_store;
pub mod llm_provider;
pub mod router;
pub mod runner;
pub mod schema;
pub mod state;
