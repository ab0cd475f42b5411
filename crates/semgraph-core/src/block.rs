//! Document content blocks and provenance spans.
//!
//! Blocks are owned by the document layer; the pipeline treats them as an
//! ordered, read-only slice. A [`BlockRef`] records which block (and
//! optionally which character span inside it) a graph node was derived from.

use serde::{Deserialize, Serialize};

/// An atomic unit of document content. Ordering matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Opaque block id assigned by the document layer.
    pub id: String,
    /// Block kind as reported by the parser (paragraph, heading, ...).
    /// Open set: the pipeline never interprets it.
    pub kind: String,
    /// Plain text content.
    pub text: String,
}

/// A provenance span: the source block (and optional character range)
/// a node was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub block_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
}

impl BlockRef {
    pub fn new(block_id: impl Into<String>, from: Option<u32>, to: Option<u32>) -> Self {
        BlockRef {
            block_id: block_id.into(),
            from,
            to,
        }
    }

    /// Deduplication key: the full `(block_id, from, to)` triple.
    pub fn span_key(&self) -> (&str, Option<u32>, Option<u32>) {
        (self.block_id.as_str(), self.from, self.to)
    }
}

/// Deduplicates provenance spans by `(block_id, from, to)`, preserving
/// first-seen order.
pub fn dedupe_provenance(refs: Vec<BlockRef>) -> Vec<BlockRef> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(refs.len());
    for r in refs {
        let key = (r.block_id.clone(), r.from, r.to);
        if seen.insert(key) {
            out.push(r);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let refs = vec![
            BlockRef::new("b1", Some(0), Some(10)),
            BlockRef::new("b2", None, None),
            BlockRef::new("b1", Some(0), Some(10)),
            BlockRef::new("b1", Some(0), Some(11)),
        ];
        let deduped = dedupe_provenance(refs);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].block_id, "b1");
        assert_eq!(deduped[1].block_id, "b2");
        assert_eq!(deduped[2].to, Some(11));
    }

    #[test]
    fn same_block_different_spans_are_distinct() {
        let refs = vec![
            BlockRef::new("b1", Some(0), Some(5)),
            BlockRef::new("b1", Some(5), Some(9)),
        ];
        assert_eq!(dedupe_provenance(refs).len(), 2);
    }
}
