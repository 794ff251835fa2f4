//! Block graph returned by the document-analysis service.
//!
//! The field names and enum spellings follow the service's JSON wire format
//! (`BlockType: "KEY_VALUE_SET"`, `Relationships: [{"Type": "VALUE", "Ids": [...]}]`)
//! so a stored response deserialises directly. Values this crate does not act
//! on collapse into an `Other` variant instead of failing the whole response.
//!
//! Blocks are immutable once received; everything downstream borrows them.

use serde::{Deserialize, Serialize};

/// One unit of analysis output: a page, a line, a word, or one side of a
/// detected key/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub id: String,
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<EntityType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Block {
    /// True for the key side of a key/value pair.
    pub fn is_key(&self) -> bool {
        self.block_type == BlockType::KeyValueSet && self.entity_types.contains(&EntityType::Key)
    }

    /// Target ids of the first relationship of the given type, if any.
    pub fn first_relationship(&self, kind: RelationshipType) -> Option<&[String]> {
        self.relationships
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.ids.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Line,
    Word,
    KeyValueSet,
    Table,
    Cell,
    SelectionElement,
    #[serde(other)]
    Other,
}

impl BlockType {
    /// Map a wire spelling (`"KEY_VALUE_SET"`) onto the enum.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "PAGE" => BlockType::Page,
            "LINE" => BlockType::Line,
            "WORD" => BlockType::Word,
            "KEY_VALUE_SET" => BlockType::KeyValueSet,
            "TABLE" => BlockType::Table,
            "CELL" => BlockType::Cell,
            "SELECTION_ELEMENT" => BlockType::SelectionElement,
            _ => BlockType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Key,
    Value,
    #[serde(other)]
    Other,
}

impl EntityType {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "KEY" => EntityType::Key,
            "VALUE" => EntityType::Value,
            _ => EntityType::Other,
        }
    }
}

/// A typed, ordered edge list from one block to others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: RelationshipType,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Value,
    Child,
    #[serde(other)]
    Other,
}

impl RelationshipType {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "VALUE" => RelationshipType::Value,
            "CHILD" => RelationshipType::Child,
            _ => RelationshipType::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_service_wire_format() {
        let json = r#"{
            "BlockType": "KEY_VALUE_SET",
            "Id": "k1",
            "Confidence": 97.5,
            "Text": "First Name:",
            "EntityTypes": ["KEY"],
            "Relationships": [
                {"Type": "VALUE", "Ids": ["v1"]},
                {"Type": "CHILD", "Ids": ["w1", "w2"]}
            ]
        }"#;
        let block: Block = serde_json::from_str(json).expect("valid block");
        assert!(block.is_key());
        assert_eq!(block.text.as_deref(), Some("First Name:"));
        assert_eq!(
            block.first_relationship(RelationshipType::Value),
            Some(&["v1".to_string()][..])
        );
    }

    #[test]
    fn unknown_enum_values_are_tolerated() {
        let json = r#"{
            "BlockType": "QUERY_RESULT",
            "Id": "q1",
            "EntityTypes": ["COLUMN_HEADER"],
            "Relationships": [{"Type": "ANSWER", "Ids": ["a"]}]
        }"#;
        let block: Block = serde_json::from_str(json).expect("tolerant parse");
        assert_eq!(block.block_type, BlockType::Other);
        assert_eq!(block.entity_types, vec![EntityType::Other]);
        assert_eq!(block.relationships[0].kind, RelationshipType::Other);
        assert!(!block.is_key());
    }

    #[test]
    fn value_side_is_not_a_key() {
        let block = Block {
            id: "v".into(),
            block_type: BlockType::KeyValueSet,
            text: Some("Alice".into()),
            entity_types: vec![EntityType::Value],
            relationships: vec![],
        };
        assert!(!block.is_key());
    }

    #[test]
    fn wire_spellings_round_into_enums() {
        assert_eq!(BlockType::from_wire("KEY_VALUE_SET"), BlockType::KeyValueSet);
        assert_eq!(BlockType::from_wire("MERGED_CELL"), BlockType::Other);
        assert_eq!(EntityType::from_wire("KEY"), EntityType::Key);
        assert_eq!(RelationshipType::from_wire("CHILD"), RelationshipType::Child);
    }
}
