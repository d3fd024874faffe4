//! Fetched documents.

use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, BlockNode};
use crate::id::DocumentId;

/// One fetched unit of remote content.
///
/// Created on first fetch; replaced wholesale by a re-fetch (new version,
/// new root), never partially updated. The sync engine owns documents
/// until it hands them, read-only, to the renderer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Monotonic version assigned by the document service.
    pub version: i64,
    pub title: String,
    pub root: BlockNode,
}

impl Document {
    /// Ids of sub-documents referenced from this document's block tree.
    ///
    /// Collects the target ids of `Page` and `PageLink` blocks, deduplicated
    /// and sorted so traversal order is deterministic. Ids that fail to
    /// parse are skipped; a malformed reference is the referencing
    /// document's problem, not a reason to abort the walk.
    #[must_use]
    pub fn sub_document_ids(&self) -> Vec<DocumentId> {
        let mut ids = Vec::new();
        self.root.for_each(&mut |block| {
            if matches!(block.kind, BlockKind::Page { .. } | BlockKind::PageLink { .. })
                && let Ok(id) = block.id.parse::<DocumentId>()
            {
                ids.push(id);
            }
        });
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_id(n: u8) -> String {
        format!("{n:032x}")
    }

    fn page_block(id: &str, title: &str) -> BlockNode {
        BlockNode::new(
            id,
            BlockKind::Page {
                title: title.to_owned(),
            },
        )
    }

    fn sample_document() -> Document {
        let mut root = BlockNode::new(doc_id(1), BlockKind::Text);
        root.children.push(page_block(&doc_id(2), "second"));
        root.children.push(page_block(&doc_id(3), "third"));
        // duplicate reference to the same page
        root.children.push(BlockNode::new(
            doc_id(2),
            BlockKind::PageLink {
                title: "second again".to_owned(),
            },
        ));
        Document {
            id: doc_id(1).parse().unwrap(),
            version: 7,
            title: "root".to_owned(),
            root,
        }
    }

    #[test]
    fn test_sub_document_ids_deduplicated_and_sorted() {
        let doc = sample_document();
        let ids = doc.sub_document_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), doc_id(2));
        assert_eq!(ids[1].as_str(), doc_id(3));
    }

    #[test]
    fn test_sub_document_ids_skips_malformed() {
        let mut root = BlockNode::new(doc_id(1), BlockKind::Text);
        root.children.push(page_block("not-a-valid-id", "broken"));
        let doc = Document {
            id: doc_id(1).parse().unwrap(),
            version: 1,
            title: String::new(),
            root,
        };
        assert!(doc.sub_document_ids().is_empty());
    }

    #[test]
    fn test_document_json_round_trip() {
        let doc = sample_document();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
