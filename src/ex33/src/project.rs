//! Category projection and gap detection.
//!
//! Cross-references the [`Index`] against the [`Schema`] to build the tree of
//! categories shown to the user. Every indexed leaf lands in exactly one
//! category node: its mapped category, or [`UNCATEGORIZED`].

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::document::{SaveDocument, Scalar};
use crate::index::Index;
use crate::mapping::{Schema, ValueKind};

/// Reserved top-level category for leaves no mapping entry covers
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A leaf attached to a category
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedLeaf {
    /// Normalized key path of the leaf
    pub key: String,
    pub display_name: String,
    pub value: Scalar,
    /// Declared kind, or the runtime kind when unmapped
    pub kind: ValueKind,
    /// Position of the governing entry in the schema
    pub mapping: Option<usize>,
    /// Set by [`CategoryNode::filter`] on leaves matching the query
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryNode {
    pub name: String,
    pub children: Vec<CategoryNode>,
    pub leaves: Vec<ProjectedLeaf>,
    /// Set by [`CategoryNode::filter`] on nodes whose name matches the query
    pub highlighted: bool,
}

impl CategoryNode {
    pub fn new(name: &str) -> Self {
        CategoryNode {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&CategoryNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_mut_or_insert(&mut self, name: &str) -> &mut CategoryNode {
        let position = match self.children.iter().position(|c| c.name == name) {
            Some(position) => position,
            None => {
                self.children.push(CategoryNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[position]
    }

    /// Descend by category names from this node
    pub fn find(&self, path: &[&str]) -> Option<&CategoryNode> {
        path.iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Leaves in this node and all descendants
    pub fn leaf_count(&self) -> usize {
        self.leaves.len() + self.children.iter().map(CategoryNode::leaf_count).sum::<usize>()
    }

    /// Visit every leaf with the category path leading to it
    pub fn walk_leaves<'a>(&'a self, visit: &mut dyn FnMut(&[&'a str], &'a ProjectedLeaf)) {
        fn walk<'a>(
            node: &'a CategoryNode,
            trail: &mut Vec<&'a str>,
            visit: &mut dyn FnMut(&[&'a str], &'a ProjectedLeaf),
        ) {
            for leaf in &node.leaves {
                visit(trail, leaf);
            }
            for child in &node.children {
                trail.push(&child.name);
                walk(child, trail, visit);
                trail.pop();
            }
        }
        walk(self, &mut Vec::new(), visit);
    }

    /// Subtree of nodes and leaves matching `query` (case-insensitive) on a
    /// display name or raw key path. Ancestors of matches are kept so the
    /// structure is preserved; a matching category keeps its whole subtree.
    /// Matches are flagged `highlighted`. The tree itself is not modified.
    pub fn filter(&self, query: &str) -> CategoryNode {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }
        let mut root = self
            .filter_node(&needle)
            .unwrap_or_else(|| CategoryNode::new(&self.name));
        root.highlighted = false;
        root
    }

    fn filter_node(&self, needle: &str) -> Option<CategoryNode> {
        if self.name.to_lowercase().contains(needle) {
            let mut whole = self.clone();
            whole.highlighted = true;
            for leaf in &mut whole.leaves {
                leaf.highlighted = leaf_matches(leaf, needle);
            }
            return Some(whole);
        }

        let leaves: Vec<ProjectedLeaf> = self
            .leaves
            .iter()
            .filter(|leaf| leaf_matches(leaf, needle))
            .map(|leaf| ProjectedLeaf {
                highlighted: true,
                ..leaf.clone()
            })
            .collect();
        let children: Vec<CategoryNode> = self
            .children
            .iter()
            .filter_map(|child| child.filter_node(needle))
            .collect();

        if leaves.is_empty() && children.is_empty() {
            return None;
        }
        Some(CategoryNode {
            name: self.name.clone(),
            children,
            leaves,
            highlighted: false,
        })
    }
}

fn leaf_matches(leaf: &ProjectedLeaf, needle: &str) -> bool {
    leaf.display_name.to_lowercase().contains(needle) || leaf.key.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapKind {
    /// Leaf present in the data that no mapping entry covers
    UnmappedKey,
    /// Mapping entry that declares no subcategory
    MissingSubcategory,
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapKind::UnmappedKey => f.write_str("unmapped key"),
            GapKind::MissingSubcategory => f.write_str("missing subcategory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapRecord {
    pub kind: GapKind,
    /// Data key path for unmapped keys, the entry's key pattern for missing subcategories
    pub key: String,
    /// Category the key was attached under
    pub category: Vec<String>,
}

/// Category tree plus the gaps found while building it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub root: CategoryNode,
    pub gaps: Vec<GapRecord>,
}

impl Projection {
    /// Attach every indexed leaf of `document` under its category and
    /// collect gaps.
    ///
    /// A missing-subcategory gap is reported once per mapping entry: at the
    /// first leaf the entry matches, or after all leaves, in schema order,
    /// for entries that match nothing.
    pub fn build(document: &SaveDocument, index: &Index, schema: &Schema) -> Self {
        let mut root = CategoryNode::default();
        let mut unmapped = Vec::new();
        let mut gaps = Vec::new();
        let mut reported: HashSet<usize> = HashSet::new();

        for entry in index.iter() {
            match schema.lookup_in(document, &entry.path) {
                Some((position, mapping)) => {
                    let category = mapping.category_path();
                    let node = category
                        .iter()
                        .fold(&mut root, |node, name| node.child_mut_or_insert(name));
                    node.leaves.push(ProjectedLeaf {
                        key: entry.key.clone(),
                        display_name: mapping.display_name.clone(),
                        value: entry.value.clone(),
                        kind: mapping.value_kind,
                        mapping: Some(position),
                        highlighted: false,
                    });

                    if mapping.subcategory.is_none() && reported.insert(position) {
                        gaps.push(GapRecord {
                            kind: GapKind::MissingSubcategory,
                            key: mapping.key(),
                            category,
                        });
                    }
                }
                None => {
                    gaps.push(GapRecord {
                        kind: GapKind::UnmappedKey,
                        key: entry.key.clone(),
                        category: vec![UNCATEGORIZED.to_string()],
                    });
                    unmapped.push(ProjectedLeaf {
                        key: entry.key.clone(),
                        display_name: entry.path.leaf_label(),
                        value: entry.value.clone(),
                        kind: entry.value.kind(),
                        mapping: None,
                        highlighted: false,
                    });
                }
            }
        }

        if !unmapped.is_empty() {
            root.child_mut_or_insert(UNCATEGORIZED).leaves.extend(unmapped);
        }

        for (position, mapping) in schema.entries().iter().enumerate() {
            if mapping.subcategory.is_none() && !reported.contains(&position) {
                gaps.push(GapRecord {
                    kind: GapKind::MissingSubcategory,
                    key: mapping.key(),
                    category: mapping.category.clone(),
                });
            }
        }

        debug!(
            leaves = index.len(),
            categories = root.children.len(),
            gaps = gaps.len(),
            "Built category projection"
        );
        if !gaps.is_empty() {
            warn!(count = gaps.len(), "Mapping gaps detected");
        }

        Projection { root, gaps }
    }

    /// Filtered view of the tree; see [`CategoryNode::filter`]
    pub fn search(&self, query: &str) -> CategoryNode {
        self.root.filter(query)
    }

    pub fn gaps_of(&self, kind: GapKind) -> impl Iterator<Item = &GapRecord> {
        self.gaps.iter().filter(move |g| g.kind == kind)
    }
}

/// Render gaps as the plain-text gap log
pub fn render_gap_log(gaps: &[GapRecord]) -> String {
    let mut out = format!("# {} gap(s): kind\tkey\tcategory\n", gaps.len());
    for gap in gaps {
        let category = if gap.category.is_empty() {
            "-".to_string()
        } else {
            gap.category.join("/")
        };
        out.push_str(&format!("{}\t{}\t{}\n", gap.kind, gap.key, category));
    }
    out
}

/// Overwrite the gap log with the gaps of the latest projection
pub fn write_gap_log(path: &Path, gaps: &[GapRecord]) -> io::Result<()> {
    fs::write(path, render_gap_log(gaps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SaveDocument;
    use crate::mapping::MappingEntry;

    fn test_schema() -> Schema {
        Schema::from_entries(vec![
            MappingEntry::parse("player.level", "Level", &["Character"], ValueKind::Integer)
                .unwrap(),
            MappingEntry::parse("player.name", "Name", &["Character"], ValueKind::String)
                .unwrap()
                .with_subcategory("Identity"),
            MappingEntry::parse("inventory[*].count", "Count", &["Items"], ValueKind::Integer)
                .unwrap(),
        ])
        .unwrap()
    }

    fn test_document() -> SaveDocument {
        SaveDocument::from_json(
            br#"{
  "player": {"level": 7, "name": "Hero", "secretFlag": true},
  "inventory": [{"count": 3}, {"count": 9}]
}"#,
        )
        .unwrap()
    }

    fn project() -> Projection {
        let doc = test_document();
        let index = Index::build(&doc).unwrap();
        Projection::build(&doc, &index, &test_schema())
    }

    fn keys(node: &CategoryNode) -> Vec<&str> {
        node.leaves.iter().map(|l| l.key.as_str()).collect()
    }

    #[test]
    fn test_categories_and_uncategorized() {
        let projection = project();
        let root = &projection.root;

        let character = root.find(&["Character"]).unwrap();
        assert_eq!(keys(character), vec!["player.level"]);
        assert_eq!(character.leaves[0].display_name, "Level");

        let identity = root.find(&["Character", "Identity"]).unwrap();
        assert_eq!(keys(identity), vec!["player.name"]);

        let uncategorized = root.find(&[UNCATEGORIZED]).unwrap();
        assert_eq!(keys(uncategorized), vec!["player.secretFlag"]);
        assert_eq!(uncategorized.leaves[0].display_name, "secretFlag");
        assert_eq!(uncategorized.leaves[0].kind, ValueKind::Boolean);
        assert_eq!(root.children.last().unwrap().name, UNCATEGORIZED);
    }

    #[test]
    fn test_every_leaf_lands_exactly_once() {
        let doc = test_document();
        let index = Index::build(&doc).unwrap();
        let projection = Projection::build(&doc, &index, &test_schema());

        let mut seen = Vec::new();
        projection.root.walk_leaves(&mut |_, leaf| seen.push(leaf.key.clone()));
        seen.sort();
        let mut expected: Vec<String> = index.iter().map(|e| e.key.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(projection.root.leaf_count(), index.len());
    }

    #[test]
    fn test_gap_records() {
        let projection = project();
        assert_eq!(
            projection.gaps,
            vec![
                GapRecord {
                    kind: GapKind::MissingSubcategory,
                    key: "player.level".into(),
                    category: vec!["Character".into()],
                },
                GapRecord {
                    kind: GapKind::UnmappedKey,
                    key: "player.secretFlag".into(),
                    category: vec![UNCATEGORIZED.into()],
                },
                GapRecord {
                    kind: GapKind::MissingSubcategory,
                    key: "inventory[*].count".into(),
                    category: vec!["Items".into()],
                },
            ]
        );
        assert_eq!(projection.gaps_of(GapKind::UnmappedKey).count(), 1);
    }

    #[test]
    fn test_wildcard_entry_attaches_all_positions() {
        let projection = project();
        let items = projection.root.find(&["Items"]).unwrap();
        assert_eq!(keys(items), vec!["inventory[0].count", "inventory[1].count"]);
        assert!(items.leaves.iter().all(|l| l.mapping == Some(2)));
    }

    #[test]
    fn test_empty_schema_puts_everything_in_uncategorized() {
        let doc = test_document();
        let index = Index::build(&doc).unwrap();
        let projection = Projection::build(&doc, &index, &Schema::default());
        assert_eq!(projection.root.children.len(), 1);
        assert_eq!(projection.root.children[0].leaves.len(), index.len());
        assert_eq!(projection.gaps.len(), index.len());
    }

    #[test]
    fn test_entry_without_subcategory_matching_nothing_is_a_gap() {
        let schema = Schema::from_entries(vec![
            MappingEntry::parse("player.xp", "XP", &["Character"], ValueKind::Integer).unwrap(),
            MappingEntry::parse("player.name", "Name", &["Character"], ValueKind::String)
                .unwrap()
                .with_subcategory("Identity"),
        ])
        .unwrap();
        let doc =
            SaveDocument::from_json(br#"{"player": {"name": "Hero", "secretFlag": true}}"#)
                .unwrap();
        let index = Index::build(&doc).unwrap();
        let projection = Projection::build(&doc, &index, &schema);

        assert_eq!(
            projection.gaps,
            vec![
                GapRecord {
                    kind: GapKind::UnmappedKey,
                    key: "player.secretFlag".into(),
                    category: vec![UNCATEGORIZED.into()],
                },
                GapRecord {
                    kind: GapKind::MissingSubcategory,
                    key: "player.xp".into(),
                    category: vec!["Character".into()],
                },
            ]
        );
        assert!(projection.root.find(&["Character", "XP"]).is_none());
    }

    #[test]
    fn test_legacy_items_project_into_their_categories() {
        let schema = Schema::from_yaml_str(
            "items:\n  - save_key: ExpGradient\n    name: Experience Gradient\n    category: Items.Upgrades\n",
        )
        .unwrap();
        let doc = SaveDocument::from_json(
            br#"{"root": {"properties": {"InventoryItems_0": {"Map": [
  {"key": {"Name": "ExpGradient"}, "value": {"Int": 5}}
]}}}}"#,
        )
        .unwrap();
        let index = Index::build(&doc).unwrap();
        let projection = Projection::build(&doc, &index, &schema);

        let upgrades = projection.root.find(&["Items", "Upgrades"]).unwrap();
        assert_eq!(
            keys(upgrades),
            vec!["root.properties.InventoryItems_0.Map[0].value.Int"]
        );
        assert_eq!(upgrades.leaves[0].display_name, "Experience Gradient");
        assert_eq!(upgrades.leaves[0].value, Scalar::Int(5));

        let uncategorized = projection.root.find(&[UNCATEGORIZED]).unwrap();
        assert_eq!(
            keys(uncategorized),
            vec!["root.properties.InventoryItems_0.Map[0].key.Name"]
        );
    }

    #[test]
    fn test_filter_matches_name_and_key_case_insensitively() {
        let projection = project();
        let before = projection.clone();

        let by_name = projection.search("LEV");
        let character = by_name.find(&["Character"]).unwrap();
        assert_eq!(keys(character), vec!["player.level"]);
        assert!(character.leaves[0].highlighted);
        assert!(character.child("Identity").is_none());
        assert!(by_name.child(UNCATEGORIZED).is_none());

        let by_key = projection.search("secretflag");
        assert_eq!(
            keys(by_key.find(&[UNCATEGORIZED]).unwrap()),
            vec!["player.secretFlag"]
        );
        assert_eq!(by_key.children.len(), 1);

        assert_eq!(projection, before);
    }

    #[test]
    fn test_filter_category_name_keeps_subtree() {
        let projection = project();
        let filtered = projection.search("charac");
        let character = filtered.find(&["Character"]).unwrap();
        assert!(character.highlighted);
        assert_eq!(character.leaf_count(), 2);
        assert!(!character.child("Identity").unwrap().highlighted);
    }

    #[test]
    fn test_filter_empty_and_no_match() {
        let projection = project();
        assert_eq!(projection.search("  "), projection.root);

        let nothing = projection.search("zzz");
        assert!(nothing.children.is_empty());
        assert!(nothing.leaves.is_empty());
    }

    #[test]
    fn test_gap_log_is_overwritten() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = temp_dir.path().join("missing_subcategories.log");
        let projection = project();

        write_gap_log(&log, &projection.gaps).unwrap();
        let first = fs::read_to_string(&log).unwrap();
        assert!(first.starts_with("# 3 gap(s)"));
        assert!(first.contains("missing subcategory\tplayer.level\tCharacter\n"));
        assert!(first.contains("unmapped key\tplayer.secretFlag\tUncategorized\n"));

        write_gap_log(&log, &projection.gaps[..1]).unwrap();
        let second = fs::read_to_string(&log).unwrap();
        assert_eq!(second.lines().count(), 2);
    }
}
