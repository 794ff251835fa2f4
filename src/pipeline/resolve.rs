//! Block graph resolution: key blocks → `(key, value)` string pairs.
//!
//! The analysis service returns a flat list of blocks where a key block
//! points at its value block by id. A [`BlockIndex`] is built once (one pass,
//! O(n)) so each value lookup is a hash probe instead of a scan of the whole
//! response.
//!
//! Missing data is never an error here: a dangling value id, a value block
//! without text, or a key block without text all resolve to empty strings so
//! partial OCR output still reaches the template.

use crate::blocks::{Block, BlockType, RelationshipType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Read-only id → block lookup over one analysis result.
#[derive(Debug)]
pub struct BlockIndex<'a> {
    by_id: HashMap<&'a str, &'a Block>,
}

impl<'a> BlockIndex<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        let mut by_id = HashMap::with_capacity(blocks.len());
        for block in blocks {
            // First occurrence wins if the service ever repeats an id.
            by_id.entry(block.id.as_str()).or_insert(block);
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A key label and the value text the service paired with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPair {
    pub key: String,
    pub value: String,
    /// Id of the key block the pair came from.
    pub key_block_id: String,
}

/// Where block text is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// When a key or value block has no `text` of its own, join the text of
    /// its `CHILD` word blocks instead. Off by default: a block without text
    /// resolves to the empty string.
    pub child_text_fallback: bool,
}

/// Resolve every key block to a pair, in block order.
///
/// Duplicate keys are kept; the populator's overwrite rule decides which wins.
pub fn resolve_pairs(blocks: &[Block]) -> Vec<ResolvedPair> {
    resolve_pairs_with(blocks, ResolveOptions::default())
}

pub fn resolve_pairs_with(blocks: &[Block], options: ResolveOptions) -> Vec<ResolvedPair> {
    let index = BlockIndex::new(blocks);
    let pairs: Vec<ResolvedPair> = blocks
        .iter()
        .filter(|b| b.is_key())
        .map(|key_block| ResolvedPair {
            key: block_text(key_block, &index, options),
            value: resolve_value(key_block, &index, options),
            key_block_id: key_block.id.clone(),
        })
        .collect();
    debug!(
        "Resolved {} key/value pairs from {} blocks",
        pairs.len(),
        index.len()
    );
    pairs
}

/// Text of the block named by the first target of the first `VALUE` edge.
fn resolve_value(key_block: &Block, index: &BlockIndex<'_>, options: ResolveOptions) -> String {
    key_block
        .first_relationship(RelationshipType::Value)
        .and_then(|ids| ids.first())
        .and_then(|id| index.get(id))
        .map(|value_block| block_text(value_block, index, options))
        .unwrap_or_default()
}

fn block_text(block: &Block, index: &BlockIndex<'_>, options: ResolveOptions) -> String {
    if let Some(text) = &block.text {
        return text.clone();
    }
    if !options.child_text_fallback {
        return String::new();
    }
    block
        .first_relationship(RelationshipType::Child)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| index.get(id))
                .filter(|child| child.block_type == BlockType::Word)
                .filter_map(|child| child.text.as_deref())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{EntityType, Relationship};

    fn key(id: &str, text: Option<&str>, value_ids: &[&str]) -> Block {
        Block {
            id: id.into(),
            block_type: BlockType::KeyValueSet,
            text: text.map(str::to_string),
            entity_types: vec![EntityType::Key],
            relationships: if value_ids.is_empty() {
                vec![]
            } else {
                vec![Relationship {
                    kind: RelationshipType::Value,
                    ids: value_ids.iter().map(|s| s.to_string()).collect(),
                }]
            },
        }
    }

    fn value(id: &str, text: Option<&str>) -> Block {
        Block {
            id: id.into(),
            block_type: BlockType::KeyValueSet,
            text: text.map(str::to_string),
            entity_types: vec![EntityType::Value],
            relationships: vec![],
        }
    }

    fn word(id: &str, text: &str) -> Block {
        Block {
            id: id.into(),
            block_type: BlockType::Word,
            text: Some(text.into()),
            entity_types: vec![],
            relationships: vec![],
        }
    }

    #[test]
    fn resolves_key_to_linked_value() {
        let blocks = vec![key("k", Some("First Name:"), &["v"]), value("v", Some("Alice"))];
        let pairs = resolve_pairs(&blocks);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key, "First Name:");
        assert_eq!(pairs[0].value, "Alice");
        assert_eq!(pairs[0].key_block_id, "k");
    }

    #[test]
    fn dangling_value_id_resolves_to_empty() {
        let blocks = vec![key("k", Some("First Name:"), &["missing"])];
        let pairs = resolve_pairs(&blocks);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].value, "");
    }

    #[test]
    fn value_without_text_resolves_to_empty() {
        let blocks = vec![key("k", Some("Job Title:"), &["v"]), value("v", None)];
        assert_eq!(resolve_pairs(&blocks)[0].value, "");
    }

    #[test]
    fn key_without_value_edge_still_yields_pair() {
        let blocks = vec![key("k", Some("End Date:"), &[])];
        let pairs = resolve_pairs(&blocks);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].value, "");
    }

    #[test]
    fn key_without_text_yields_empty_key() {
        let blocks = vec![key("k", None, &["v"]), value("v", Some("x"))];
        let pairs = resolve_pairs(&blocks);
        assert_eq!(pairs[0].key, "");
        assert_eq!(pairs[0].value, "x");
    }

    #[test]
    fn only_first_value_target_is_used() {
        let blocks = vec![
            key("k", Some("Loan Amount:"), &["v1", "v2"]),
            value("v1", None),
            value("v2", Some("$10,000")),
        ];
        assert_eq!(resolve_pairs(&blocks)[0].value, "");
    }

    #[test]
    fn non_key_blocks_produce_nothing() {
        let line = Block {
            id: "l".into(),
            block_type: BlockType::Line,
            text: Some("First Name:".into()),
            entity_types: vec![EntityType::Key],
            relationships: vec![],
        };
        let blocks = vec![line, value("v", Some("Alice"))];
        assert!(resolve_pairs(&blocks).is_empty());
    }

    #[test]
    fn duplicates_are_kept_in_block_order() {
        let blocks = vec![
            key("k1", Some("First Name:"), &["v1"]),
            value("v1", Some("Alice")),
            key("k2", Some("First Name:"), &["v2"]),
            value("v2", Some("Alicia")),
        ];
        let values: Vec<_> = resolve_pairs(&blocks)
            .into_iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec!["Alice", "Alicia"]);
    }

    #[test]
    fn child_text_fallback_joins_words() {
        let mut k = key("k", None, &["v"]);
        k.relationships.push(Relationship {
            kind: RelationshipType::Child,
            ids: vec!["w1".into(), "w2".into()],
        });
        let mut v = value("v", None);
        v.relationships.push(Relationship {
            kind: RelationshipType::Child,
            ids: vec!["w3".into()],
        });
        let blocks = vec![k, v, word("w1", "First"), word("w2", "Name:"), word("w3", "Alice")];

        let plain = resolve_pairs(&blocks);
        assert_eq!(plain[0].key, "");

        let pairs = resolve_pairs_with(
            &blocks,
            ResolveOptions {
                child_text_fallback: true,
            },
        );
        assert_eq!(pairs[0].key, "First Name:");
        assert_eq!(pairs[0].value, "Alice");
    }

    #[test]
    fn index_looks_up_by_id() {
        let blocks = vec![value("a", Some("1")), value("b", Some("2"))];
        let index = BlockIndex::new(&blocks);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("b").and_then(|b| b.text.as_deref()), Some("2"));
        assert!(index.get("c").is_none());
    }
}
