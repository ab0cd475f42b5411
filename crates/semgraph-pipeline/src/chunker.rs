//! Token-budgeted chunking of ordered content blocks.
//!
//! Pure and infallible: for any non-empty input and positive budgets the
//! chunk starts strictly increase, every chunk holds at least one block,
//! and the `[start, end)` ranges cover the whole block list with no gaps.
//! Consecutive chunks share a trailing overlap bounded by its own token
//! budget and capped strictly below the chunk's length so the next start
//! always advances.

use serde::{Deserialize, Serialize};

use semgraph_core::block::Block;

/// Fixed per-block token overhead added on top of the text estimate
/// (structure markers, ids, framing in the collaborator payload).
pub const BLOCK_OVERHEAD_TOKENS: u64 = 8;

const DEFAULT_TARGET_TOKEN_BUDGET: u64 = 1000;
const DEFAULT_OVERLAP_TOKEN_BUDGET: u64 = 120;

/// Token budgets for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Approximate token ceiling per chunk.
    pub target_token_budget: u64,
    /// Approximate token budget for the trailing overlap shared with the
    /// next chunk.
    pub overlap_token_budget: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            target_token_budget: DEFAULT_TARGET_TOKEN_BUDGET,
            overlap_token_budget: DEFAULT_OVERLAP_TOKEN_BUDGET,
        }
    }
}

/// A contiguous slice of blocks sized to the token budget. Ephemeral,
/// created per job run; `blocks[start..end]` is the chunk's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub start: usize,
    pub end: usize,
}

/// Estimated token cost of one block: `ceil(len/4)` plus fixed overhead.
pub fn block_cost(block: &Block) -> u64 {
    (block.text.len() as u64).div_ceil(4) + BLOCK_OVERHEAD_TOKENS
}

/// Splits `blocks` into ordered, overlapping, token-budgeted chunks.
pub fn chunk_blocks(blocks: &[Block], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < blocks.len() {
        // Always take at least one block, even when its cost alone exceeds
        // the budget. Content is never silently dropped.
        let mut end = start + 1;
        let mut used = block_cost(&blocks[start]);
        while end < blocks.len() {
            let cost = block_cost(&blocks[end]);
            if used + cost > config.target_token_budget {
                break;
            }
            used += cost;
            end += 1;
        }

        chunks.push(Chunk {
            id: format!("chunk-{index}"),
            start,
            end,
        });
        index += 1;

        if end == blocks.len() {
            break;
        }

        // Overlap: walk backward from the chunk end, accumulating cost,
        // capped strictly below the chunk length so the next start advances.
        let max_overlap = end - start - 1;
        let mut overlap = 0usize;
        let mut overlap_cost = 0u64;
        while overlap < max_overlap {
            let cost = block_cost(&blocks[end - 1 - overlap]);
            if overlap_cost + cost > config.overlap_token_budget {
                break;
            }
            overlap_cost += cost;
            overlap += 1;
        }

        start = end - overlap;
    }

    chunks
}
