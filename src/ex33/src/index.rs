//! Flat index of every leaf in a save document.

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::document::{SaveDocument, SaveNode, Scalar};
use crate::path::KeyPath;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported node at '{path}': {reason}")]
    UnsupportedNode { path: String, reason: String },

    #[error("Two different leaves share the key path '{path}'")]
    PathCollision { path: String },
}

/// A leaf of the document, addressed by key path
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Location of the leaf in the tree
    pub path: KeyPath,
    /// Normalized text of `path`
    pub key: String,
    /// Value at the time the index was built
    pub value: Scalar,
}

/// Every leaf scalar reachable from the root, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    entries: Vec<IndexEntry>,
    by_key: HashMap<String, usize>,
}

impl Index {
    /// Walk the document and index each leaf exactly once
    pub fn build(document: &SaveDocument) -> Result<Self, IndexError> {
        let mut index = Index::default();
        index.walk(document.root(), KeyPath::root())?;
        debug!(leaves = index.entries.len(), "Indexed save document");
        Ok(index)
    }

    fn walk(&mut self, node: &SaveNode, at: KeyPath) -> Result<(), IndexError> {
        match node {
            SaveNode::Scalar(value) => self.insert(at, value.clone()),
            SaveNode::Object(members) => members
                .iter()
                .try_for_each(|(key, child)| self.walk(child, at.child_key(key))),
            SaveNode::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, child)| self.walk(child, at.child_index(i))),
        }
    }

    fn insert(&mut self, path: KeyPath, value: Scalar) -> Result<(), IndexError> {
        let key = path.to_string();
        if self.by_key.contains_key(&key) {
            return Err(IndexError::PathCollision { path: key });
        }
        self.by_key.insert(key.clone(), self.entries.len());
        self.entries.push(IndexEntry { path, key, value });
        Ok(())
    }

    /// Look up a leaf by its normalized key path text
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document() -> SaveDocument {
        SaveDocument::from_json(
            br#"{
  "player": {"level": 7, "name": "Hero", "secretFlag": true},
  "inventory": [
    {"id": "Potion", "count": 3},
    {"id": "Tint", "count": 1}
  ],
  "empty": {},
  "none": [],
  "grid": [[1, 2], [3]]
}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_index_covers_every_leaf_in_document_order() {
        let index = Index::build(&test_document()).unwrap();
        let keys: Vec<&str> = index.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "player.level",
                "player.name",
                "player.secretFlag",
                "inventory[0].id",
                "inventory[0].count",
                "inventory[1].id",
                "inventory[1].count",
                "grid[0][0]",
                "grid[0][1]",
                "grid[1][0]",
            ]
        );
    }

    #[test]
    fn test_index_is_idempotent() {
        let doc = test_document();
        let first = Index::build(&doc).unwrap();
        let second = Index::build(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_point_back_into_document() {
        let doc = test_document();
        let index = Index::build(&doc).unwrap();
        for entry in index.iter() {
            assert_eq!(doc.leaf(&entry.path), Some(&entry.value));
            assert_eq!(KeyPath::parse(&entry.key).unwrap(), entry.path);
        }
        assert_eq!(index.get("inventory[1].count").unwrap().value, Scalar::Int(1));
        assert!(index.get("inventory[2].count").is_none());
        assert!(!index.contains("player"));
    }

    #[test]
    fn test_scalar_root() {
        let doc = SaveDocument::from_json(b"42").unwrap();
        let index = Index::build(&doc).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].key, "");
    }

    #[test]
    fn test_dotted_member_name_collision() {
        let doc = SaveDocument::from_json(br#"{"a": {"b": 1}, "a.b": 2}"#).unwrap();
        let result = Index::build(&doc);
        assert!(matches!(result, Err(IndexError::PathCollision { ref path }) if path == "a.b"));
    }
}
