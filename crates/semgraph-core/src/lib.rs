//! Core data model for semantic graphs extracted from document content.
//!
//! Defines the block/provenance types shared with the document layer, the
//! chunk-scoped mini-graph produced per extraction call, the canonical
//! merged graph, and deterministic content-derived node identity.

pub mod block;
pub mod graph;
pub mod id;
