//! Mapping schema: which save keys belong to which display categories.
//!
//! The schema is a human-edited YAML file. Two layouts are accepted in the
//! same file and concatenated in order:
//!
//! ```yaml
//! entries:
//!   - key: player.level
//!     name: Level
//!     category: [Character]
//!     subcategory: Stats
//!     kind: integer
//! items:
//!   - save_key: ExpGradient
//!     name: Experience Gradient
//!     category: Items.Upgrades
//! ```
//!
//! `items` is the flat table used by earlier versions of the editor, where
//! the category string is `Main.Sub` and values are always integers. A
//! `save_key` names an element of one of the `InventoryItems_*` maps in a
//! converted save; the item is mapped to that element's `value.Int` leaf, so
//! `ExpGradient` becomes
//! `root.properties.*.Map[key.Name=ExpGradient].value.Int`.
//!
//! A bracket of the form `[field=value]` in a key pattern selects the array
//! elements whose `field` (a dotted path inside the element) holds the
//! string `value`. Selectors are resolved against the document, so they only
//! match through [`Schema::lookup_in`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::document::{SaveDocument, Scalar};
use crate::path::{split_segments, KeyPath, PathError, RawSegment, Segment};

/// Where legacy `items:` entries live in a converted save
const LEGACY_ITEM_PREFIX: &str = "root.properties.*.Map";
const LEGACY_ITEM_NAME: &str = "key.Name";
const LEGACY_ITEM_VALUE: &str = "value.Int";

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse mapping YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Mapping entry #{position} has an empty key path")]
    EmptyKeyPath { position: usize },

    #[error("Mapping entry '{key}' has an empty category path")]
    EmptyCategory { key: String },

    #[error("Duplicate mapping key: {key}")]
    DuplicateKey { key: String },

    #[error("Invalid key pattern '{key}': {source}")]
    InvalidPattern { key: String, source: PathError },
}

/// Declared type of a mapped value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[serde(alias = "int")]
    Integer,
    Float,
    #[serde(alias = "bool")]
    Boolean,
    String,
    /// Not interpreted; edits keep whatever type is already stored
    #[default]
    Opaque,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// How array positions in save data are matched against patterns
///
/// `Explicit` requires every array position in the data to be matched by
/// `[n]` or `[*]` in the pattern. `AnyPosition` additionally lets a pattern
/// omit array positions entirely, so `inventory.name` matches
/// `inventory[3].name`. An explicit `[n]` only ever matches position `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayPolicy {
    #[default]
    Explicit,
    AnyPosition,
}

/// One segment of a mapping key pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    Key(String),
    /// `*`
    AnyKey,
    Index(usize),
    /// `[*]`
    AnyIndex,
    /// `[field=value]`: array element whose `field` holds the string `value`
    Select { field: Vec<String>, value: String },
}

impl PatternSegment {
    /// Cost of matching one data segment without looking at the document:
    /// 0 for a literal match or selector, 1 for a wildcard
    fn match_cost(&self, segment: &Segment) -> Option<usize> {
        match (self, segment) {
            (PatternSegment::Key(a), Segment::Key(b)) if a == b => Some(0),
            (PatternSegment::AnyKey, Segment::Key(_)) => Some(1),
            (PatternSegment::Index(a), Segment::Index(b)) if a == b => Some(0),
            (PatternSegment::AnyIndex, Segment::Index(_)) => Some(1),
            (PatternSegment::Select { .. }, Segment::Index(_)) => Some(0),
            _ => None,
        }
    }

    fn is_positional(&self) -> bool {
        matches!(
            self,
            PatternSegment::Index(_) | PatternSegment::AnyIndex | PatternSegment::Select { .. }
        )
    }

    fn parse_bracket(pattern: &str, inner: &str) -> Result<Self, PathError> {
        if inner == "*" {
            return Ok(PatternSegment::AnyIndex);
        }
        if let Some((field, value)) = inner.split_once('=') {
            let field: Vec<String> = field.trim().split('.').map(str::to_string).collect();
            if field.iter().any(String::is_empty) {
                return Err(PathError::InvalidSelector {
                    path: pattern.to_string(),
                    selector: inner.to_string(),
                });
            }
            return Ok(PatternSegment::Select {
                field,
                value: value.to_string(),
            });
        }
        inner
            .parse()
            .map(PatternSegment::Index)
            .map_err(|_| PathError::InvalidIndex {
                path: pattern.to_string(),
                index: inner.to_string(),
            })
    }
}

/// A key path with optional wildcards, as written in the mapping file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern(Vec<PatternSegment>);

impl KeyPattern {
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        let segments = split_segments(pattern)?
            .into_iter()
            .map(|raw| match raw {
                RawSegment::Key("*") => Ok(PatternSegment::AnyKey),
                RawSegment::Key(key) => Ok(PatternSegment::Key(key.to_string())),
                RawSegment::Bracket(inner) => PatternSegment::parse_bracket(pattern, inner),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeyPattern(segments))
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.0
    }

    /// True when the pattern contains no wildcards or selectors
    pub fn is_literal(&self) -> bool {
        self.literal_path().is_some()
    }

    /// The one concrete path a literal pattern matches
    pub fn literal_path(&self) -> Option<KeyPath> {
        self.0
            .iter()
            .map(|s| match s {
                PatternSegment::Key(key) => Some(Segment::Key(key.clone())),
                PatternSegment::Index(index) => Some(Segment::Index(*index)),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(KeyPath::from)
    }

    pub fn matches(&self, path: &KeyPath, policy: ArrayPolicy) -> bool {
        self.match_cost(path, policy).is_some()
    }

    /// Match a concrete path, returning how many segments were matched by a
    /// wildcard or skipped. Lower is more specific. Selectors never match
    /// without a document.
    pub fn match_cost(&self, path: &KeyPath, policy: ArrayPolicy) -> Option<usize> {
        Target::new(path, None, policy).cost(&self.0, 0)
    }

    /// Like [`match_cost`](Self::match_cost), resolving selectors in `document`
    pub fn match_cost_in(
        &self,
        document: &SaveDocument,
        path: &KeyPath,
        policy: ArrayPolicy,
    ) -> Option<usize> {
        Target::new(path, Some(document), policy).cost(&self.0, 0)
    }
}

/// A concrete path being matched, and the document it points into
struct Target<'a> {
    path: &'a [Segment],
    document: Option<&'a SaveDocument>,
    policy: ArrayPolicy,
}

impl<'a> Target<'a> {
    fn new(path: &'a KeyPath, document: Option<&'a SaveDocument>, policy: ArrayPolicy) -> Self {
        Target {
            path: path.segments(),
            document,
            policy,
        }
    }

    /// Match `pattern` against the path from position `at` onwards
    fn cost(&self, pattern: &[PatternSegment], at: usize) -> Option<usize> {
        let skip = |p: Option<&PatternSegment>| {
            let skippable = self.policy == ArrayPolicy::AnyPosition
                && matches!(self.path[at], Segment::Index(_))
                && !p.is_some_and(PatternSegment::is_positional);
            if skippable {
                self.cost(pattern, at + 1).map(|cost| cost + 1)
            } else {
                None
            }
        };

        match (pattern.split_first(), at < self.path.len()) {
            (None, false) => Some(0),
            (Some(_), false) => None,
            (None, true) => skip(None),
            (Some((p, rest)), true) => {
                // The document is only consulted once the rest of the path fits
                let direct = p
                    .match_cost(&self.path[at])
                    .and_then(|cost| self.cost(rest, at + 1).map(|rest| rest + cost))
                    .filter(|_| self.selects(p, at));
                let skipped = skip(Some(p));
                match (direct, skipped) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
            }
        }
    }

    fn selects(&self, p: &PatternSegment, at: usize) -> bool {
        let PatternSegment::Select { field, value } = p else {
            return true;
        };
        let Some(document) = self.document else {
            return false;
        };
        let mut segments = self.path[..=at].to_vec();
        segments.extend(field.iter().cloned().map(Segment::Key));
        document.leaf(&KeyPath::from(segments)).and_then(Scalar::as_str) == Some(value.as_str())
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && !segment.is_positional() {
                f.write_str(".")?;
            }
            match segment {
                PatternSegment::Key(key) => f.write_str(key)?,
                PatternSegment::AnyKey => f.write_str("*")?,
                PatternSegment::Index(index) => write!(f, "[{}]", index)?,
                PatternSegment::AnyIndex => f.write_str("[*]")?,
                PatternSegment::Select { field, value } => {
                    write!(f, "[{}={}]", field.join("."), value)?
                }
            }
        }
        Ok(())
    }
}

/// One declared save key rule
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub pattern: KeyPattern,
    pub display_name: String,
    /// Category names, root to leaf
    pub category: Vec<String>,
    pub subcategory: Option<String>,
    pub value_kind: ValueKind,
}

impl MappingEntry {
    /// Build an entry from its textual key pattern
    pub fn parse(
        key: &str,
        display_name: &str,
        category: &[&str],
        value_kind: ValueKind,
    ) -> Result<Self, MappingError> {
        let pattern = KeyPattern::parse(key).map_err(|source| MappingError::InvalidPattern {
            key: key.to_string(),
            source,
        })?;
        Ok(MappingEntry {
            pattern,
            display_name: display_name.to_string(),
            category: category.iter().map(|c| c.to_string()).collect(),
            subcategory: None,
            value_kind,
        })
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.subcategory = Some(subcategory.to_string());
        self
    }

    /// Normalized key pattern text; unique within a schema
    pub fn key(&self) -> String {
        self.pattern.to_string()
    }

    /// Full display path: the category followed by the subcategory, if any
    pub fn category_path(&self) -> Vec<String> {
        let mut path = self.category.clone();
        path.extend(self.subcategory.iter().cloned());
        path
    }
}

// ============================================================================
// On-disk layout
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    entries: Vec<RawEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    items: Vec<RawLegacyItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawEntry {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    category: RawCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategory: Option<String>,
    #[serde(default)]
    kind: ValueKind,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCategory {
    Path(Vec<String>),
    Dotted(String),
}

impl Default for RawCategory {
    fn default() -> Self {
        RawCategory::Path(Vec::new())
    }
}

impl RawCategory {
    fn into_path(self) -> Vec<String> {
        match self {
            RawCategory::Path(path) => path,
            RawCategory::Dotted(text) => text.split('.').map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLegacyItem {
    save_key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    kind: Option<ValueKind>,
}

impl RawLegacyItem {
    fn into_entry(self) -> RawEntry {
        let save_key = self.save_key.trim();
        let key = if save_key.is_empty() {
            String::new()
        } else {
            format!(
                "{}[{}={}].{}",
                LEGACY_ITEM_PREFIX, LEGACY_ITEM_NAME, save_key, LEGACY_ITEM_VALUE
            )
        };
        let (category, subcategory) = match self.category.as_deref() {
            Some(text) => match text.split_once('.') {
                Some((main, sub)) => (vec![main.to_string()], Some(sub.to_string())),
                None => (vec![text.to_string()], None),
            },
            None => (Vec::new(), None),
        };
        RawEntry {
            name: self.name.or_else(|| Some(save_key.to_string())),
            key,
            category: RawCategory::Path(category),
            subcategory,
            kind: self.kind.unwrap_or(ValueKind::Integer),
        }
    }
}

fn validate_entry(position: usize, raw: RawEntry) -> Result<MappingEntry, MappingError> {
    let key = raw.key.trim();
    if key.is_empty() {
        return Err(MappingError::EmptyKeyPath { position });
    }
    let pattern = KeyPattern::parse(key).map_err(|source| MappingError::InvalidPattern {
        key: key.to_string(),
        source,
    })?;

    let category = raw.category.into_path();
    if category.is_empty() || category.iter().any(|c| c.trim().is_empty()) {
        return Err(MappingError::EmptyCategory {
            key: key.to_string(),
        });
    }

    Ok(MappingEntry {
        display_name: raw.name.unwrap_or_else(|| key.to_string()),
        pattern,
        category,
        subcategory: raw.subcategory.filter(|s| !s.trim().is_empty()),
        value_kind: raw.kind,
    })
}

// ============================================================================
// Schema
// ============================================================================

/// Validated, ordered set of mapping entries
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entries: Vec<MappingEntry>,
    /// Literal patterns by the one path they match, for the common exact lookup
    literal: HashMap<KeyPath, usize>,
    policy: ArrayPolicy,
}

impl Schema {
    /// Validate entries: keys must be unique; the first duplicate fails the load
    pub fn from_entries(entries: Vec<MappingEntry>) -> Result<Self, MappingError> {
        let mut seen = HashMap::with_capacity(entries.len());
        let mut literal = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let key = entry.key();
            if entry.category.is_empty() {
                return Err(MappingError::EmptyCategory { key });
            }
            if seen.insert(key.clone(), i).is_some() {
                return Err(MappingError::DuplicateKey { key });
            }
            if let Some(path) = entry.pattern.literal_path() {
                literal.insert(path, i);
            }
        }

        debug!(
            entries = entries.len(),
            literal = literal.len(),
            "Loaded mapping schema"
        );

        Ok(Schema {
            entries,
            literal,
            policy: ArrayPolicy::default(),
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingError> {
        let raw: RawSchema = serde_yaml::from_str(yaml)?;
        let entries = raw
            .entries
            .into_iter()
            .chain(raw.items.into_iter().map(RawLegacyItem::into_entry))
            .enumerate()
            .map(|(position, entry)| validate_entry(position, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    pub fn from_path(path: &Path) -> Result<Self, MappingError> {
        let yaml = fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Select how array positions are matched
    pub fn with_array_policy(mut self, policy: ArrayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn array_policy(&self) -> ArrayPolicy {
        self.policy
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry governing a concrete key path.
    ///
    /// A literal pattern equal to the path always wins. Otherwise the match
    /// with the fewest wildcard or skipped segments wins, and ties go to the
    /// entry declared first. Entries with selectors are skipped; use
    /// [`lookup_in`](Self::lookup_in) when the document is at hand.
    pub fn lookup(&self, path: &KeyPath) -> Option<(usize, &MappingEntry)> {
        self.find(path, None)
    }

    /// [`lookup`](Self::lookup) for a leaf of `document`, resolving selectors
    pub fn lookup_in(
        &self,
        document: &SaveDocument,
        path: &KeyPath,
    ) -> Option<(usize, &MappingEntry)> {
        self.find(path, Some(document))
    }

    fn find(
        &self,
        path: &KeyPath,
        document: Option<&SaveDocument>,
    ) -> Option<(usize, &MappingEntry)> {
        if let Some(&i) = self.literal.get(path) {
            return Some((i, &self.entries[i]));
        }

        let target = Target::new(path, document, self.policy);
        let mut best: Option<(usize, usize)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(cost) = target.cost(entry.pattern.segments(), 0) {
                if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                    best = Some((i, cost));
                }
            }
        }
        best.map(|(i, _)| (i, &self.entries[i]))
    }

    /// Entries that declare no subcategory
    pub fn entries_missing_subcategory(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().filter(|e| e.subcategory.is_none())
    }

    /// Give every entry without a subcategory the provided one.
    /// Returns the number of entries changed.
    pub fn fill_missing_subcategories(&mut self, subcategory: &str) -> usize {
        let mut filled = 0;
        for entry in self.entries.iter_mut().filter(|e| e.subcategory.is_none()) {
            entry.subcategory = Some(subcategory.to_string());
            filled += 1;
        }
        filled
    }

    /// Serialize in the hierarchical `entries:` layout
    pub fn to_yaml(&self) -> Result<String, MappingError> {
        let raw = RawSchema {
            entries: self
                .entries
                .iter()
                .map(|e| RawEntry {
                    key: e.key(),
                    name: Some(e.display_name.clone()),
                    category: RawCategory::Path(e.category.clone()),
                    subcategory: e.subcategory.clone(),
                    kind: e.value_kind,
                })
                .collect(),
            items: Vec::new(),
        };
        Ok(serde_yaml::to_string(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mapping_yaml() -> &'static str {
        r#"
entries:
  - key: player.level
    name: Level
    category: [Character]
    kind: integer
  - key: player.name
    name: Name
    category: Character
    subcategory: Identity
    kind: string
  - key: inventory[*].count
    name: Count
    category: [Items, Stack]
items:
  - save_key: ExpGradient
    name: Experience Gradient
    category: Items.Upgrades
  - save_key: Chroma
    name: Chroma
    category: Currency
"#
    }

    fn path(text: &str) -> KeyPath {
        KeyPath::parse(text).unwrap()
    }

    #[test]
    fn test_load_both_layouts() {
        let schema = Schema::from_yaml_str(test_mapping_yaml()).unwrap();
        assert_eq!(schema.len(), 5);

        let level = &schema.entries()[0];
        assert_eq!(level.category, vec!["Character"]);
        assert_eq!(level.subcategory, None);
        assert_eq!(level.value_kind, ValueKind::Integer);

        let name = &schema.entries()[1];
        assert_eq!(name.category_path(), vec!["Character", "Identity"]);

        let count = &schema.entries()[2];
        assert_eq!(count.value_kind, ValueKind::Opaque);

        let legacy = &schema.entries()[3];
        assert_eq!(
            legacy.key(),
            "root.properties.*.Map[key.Name=ExpGradient].value.Int"
        );
        assert_eq!(legacy.display_name, "Experience Gradient");
        assert_eq!(legacy.category, vec!["Items"]);
        assert_eq!(legacy.subcategory.as_deref(), Some("Upgrades"));
        assert_eq!(legacy.value_kind, ValueKind::Integer);

        assert_eq!(schema.entries()[4].subcategory, None);
    }

    #[test]
    fn test_duplicate_key_names_offender() {
        let yaml = r#"
entries:
  - key: a.b
    category: [X]
  - key: a.c
    category: [X]
  - key: a.b
    category: [Y]
"#;
        let err = Schema::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, MappingError::DuplicateKey { ref key } if key == "a.b"));
    }

    #[test]
    fn test_duplicate_across_layouts() {
        let yaml = r#"
entries:
  - key: root.properties.*.Map[key.Name=Chroma].value.Int
    category: [Currency]
items:
  - save_key: Chroma
    category: Currency.Main
"#;
        assert!(matches!(
            Schema::from_yaml_str(yaml),
            Err(MappingError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_empty_key_and_category_rejected() {
        let empty_key = "entries:\n  - key: ''\n    category: [X]\n";
        assert!(matches!(
            Schema::from_yaml_str(empty_key),
            Err(MappingError::EmptyKeyPath { position: 0 })
        ));

        let no_category = "entries:\n  - key: a\n";
        assert!(matches!(
            Schema::from_yaml_str(no_category),
            Err(MappingError::EmptyCategory { ref key }) if key == "a"
        ));

        let blank_category = "entries:\n  - key: a\n    category: ['']\n";
        assert!(matches!(
            Schema::from_yaml_str(blank_category),
            Err(MappingError::EmptyCategory { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let yaml = "entries:\n  - key: 'a[x'\n    category: [X]\n";
        assert!(matches!(
            Schema::from_yaml_str(yaml),
            Err(MappingError::InvalidPattern { .. })
        ));

        assert!(matches!(
            KeyPattern::parse("Map[key..Name=Gold]"),
            Err(PathError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_legacy_item_resolves_inventory_map_element() {
        let yaml = r#"
items:
  - save_key: ExpGradient
    category: Items.Upgrades
  - save_key: Gold
    category: Currency
"#;
        let schema = Schema::from_yaml_str(yaml).unwrap();
        let document = SaveDocument::from_json(
            br#"{"root": {"properties": {
  "InventoryItems_0": {"Map": [
    {"key": {"Name": "Gold"}, "value": {"Int": 1200}},
    {"key": {"Name": "ExpGradient"}, "value": {"Int": 5}}
  ]}
}}}"#,
        )
        .unwrap();

        let exp = path("root.properties.InventoryItems_0.Map[1].value.Int");
        let (i, entry) = schema.lookup_in(&document, &exp).unwrap();
        assert_eq!(i, 0);
        assert_eq!(entry.display_name, "ExpGradient");
        assert_eq!(entry.category_path(), vec!["Items", "Upgrades"]);

        let gold = path("root.properties.InventoryItems_0.Map[0].value.Int");
        assert_eq!(schema.lookup_in(&document, &gold).unwrap().0, 1);

        // The name leaf itself is not the mapped value
        let name = path("root.properties.InventoryItems_0.Map[1].key.Name");
        assert!(schema.lookup_in(&document, &name).is_none());
        // Selectors need the document
        assert!(schema.lookup(&exp).is_none());
    }

    #[test]
    fn test_selector_pattern_display_and_literal() {
        let pattern = KeyPattern::parse("a.Map[key.Name=Gold].value").unwrap();
        assert_eq!(pattern.to_string(), "a.Map[key.Name=Gold].value");
        assert!(!pattern.is_literal());
        assert!(!pattern.matches(&path("a.Map[0].value"), ArrayPolicy::Explicit));
    }

    #[test]
    fn test_literal_lookup_agrees_with_pattern() {
        let schema = Schema::from_entries(vec![MappingEntry::parse(
            "a.b",
            "Nested",
            &["X"],
            ValueKind::Opaque,
        )
        .unwrap()])
        .unwrap();

        let dotted_member = KeyPath::from(vec![Segment::Key("a.b".into())]);
        assert_eq!(dotted_member.to_string(), "a.b");
        assert!(!schema.entries()[0]
            .pattern
            .matches(&dotted_member, ArrayPolicy::Explicit));
        assert!(schema.lookup(&dotted_member).is_none());
        assert!(schema.lookup(&path("a.b")).is_some());
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let yaml = "entries:\n  - key: a\n    category: [X]\n    kind: decimal\n";
        assert!(matches!(Schema::from_yaml_str(yaml), Err(MappingError::Yaml(_))));
    }

    #[test]
    fn test_pattern_display_normalizes() {
        assert_eq!(KeyPattern::parse("a[*].b.*").unwrap().to_string(), "a[*].b.*");
        assert_eq!(KeyPattern::parse("[0].x").unwrap().to_string(), "[0].x");
    }

    #[test]
    fn test_explicit_policy_matching() {
        let policy = ArrayPolicy::Explicit;
        let any = KeyPattern::parse("inventory[*].count").unwrap();
        let third = KeyPattern::parse("inventory[2].count").unwrap();
        let bare = KeyPattern::parse("inventory.count").unwrap();

        assert!(any.matches(&path("inventory[0].count"), policy));
        assert!(any.matches(&path("inventory[7].count"), policy));
        assert!(third.matches(&path("inventory[2].count"), policy));
        assert!(!third.matches(&path("inventory[3].count"), policy));
        assert!(!bare.matches(&path("inventory[3].count"), policy));
        assert!(!any.matches(&path("inventory.count"), policy));
    }

    #[test]
    fn test_any_position_policy_matching() {
        let policy = ArrayPolicy::AnyPosition;
        let bare = KeyPattern::parse("inventory.count").unwrap();
        let third = KeyPattern::parse("inventory[2].count").unwrap();

        assert!(bare.matches(&path("inventory[3].count"), policy));
        assert!(bare.matches(&path("inventory[1][4].count"), policy));
        assert!(bare.matches(&path("inventory.count"), policy));
        assert!(third.matches(&path("inventory[2].count"), policy));
        assert!(!third.matches(&path("inventory[3].count"), policy));

        let list = KeyPattern::parse("flags").unwrap();
        assert!(list.matches(&path("flags[5]"), policy));
        assert!(!list.matches(&path("flags[5]"), ArrayPolicy::Explicit));
    }

    #[test]
    fn test_any_key_matching() {
        let pattern = KeyPattern::parse("root.properties.*.Level").unwrap();
        assert!(pattern.matches(&path("root.properties.Lune.Level"), ArrayPolicy::Explicit));
        assert!(!pattern.matches(&path("root.properties[0].Level"), ArrayPolicy::Explicit));
        assert!(!pattern.matches(&path("root.properties.Lune"), ArrayPolicy::Explicit));
    }

    #[test]
    fn test_lookup_prefers_most_specific() {
        let entries = vec![
            MappingEntry::parse("weapons.*.level", "Any", &["Weapons"], ValueKind::Integer)
                .unwrap(),
            MappingEntry::parse("weapons.Lune.*", "Lune stat", &["Weapons", "Lune"], ValueKind::Integer)
                .unwrap(),
            MappingEntry::parse("weapons.Lune.level", "Lune level", &["Weapons", "Lune"], ValueKind::Integer)
                .unwrap(),
        ];
        let schema = Schema::from_entries(entries).unwrap();

        let (i, entry) = schema.lookup(&path("weapons.Lune.level")).unwrap();
        assert_eq!(i, 2);
        assert_eq!(entry.display_name, "Lune level");

        let (i, _) = schema.lookup(&path("weapons.Lune.speed")).unwrap();
        assert_eq!(i, 1);
        let (i, _) = schema.lookup(&path("weapons.Maelle.level")).unwrap();
        assert_eq!(i, 0);

        assert!(schema.lookup(&path("weapons.Maelle.speed")).is_none());
    }

    #[test]
    fn test_lookup_tie_goes_to_first_declared() {
        let entries = vec![
            MappingEntry::parse("a.*.c", "First", &["X"], ValueKind::Opaque).unwrap(),
            MappingEntry::parse("a.b.*", "Second", &["Y"], ValueKind::Opaque).unwrap(),
        ];
        let schema = Schema::from_entries(entries).unwrap();
        let (_, entry) = schema.lookup(&path("a.b.c")).unwrap();
        assert_eq!(entry.display_name, "First");
    }

    #[test]
    fn test_lookup_respects_policy() {
        let entries =
            vec![MappingEntry::parse("party.name", "Name", &["Party"], ValueKind::String).unwrap()];
        let explicit = Schema::from_entries(entries.clone()).unwrap();
        assert!(explicit.lookup(&path("party[1].name")).is_none());

        let any = Schema::from_entries(entries)
            .unwrap()
            .with_array_policy(ArrayPolicy::AnyPosition);
        assert!(any.lookup(&path("party[1].name")).is_some());
    }

    #[test]
    fn test_fill_missing_subcategories_and_write_back() {
        let mut schema = Schema::from_yaml_str(test_mapping_yaml()).unwrap();
        assert_eq!(schema.entries_missing_subcategory().count(), 3);

        let filled = schema.fill_missing_subcategories("Default");
        assert_eq!(filled, 3);
        assert_eq!(schema.entries_missing_subcategory().count(), 0);

        let yaml = schema.to_yaml().unwrap();
        let reloaded = Schema::from_yaml_str(&yaml).unwrap();
        assert_eq!(reloaded.entries(), schema.entries());
        assert_eq!(
            reloaded.entries()[0].category_path(),
            vec!["Character", "Default"]
        );
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = Schema::from_path(Path::new("/nonexistent/ex33_mapping.yaml"));
        assert!(matches!(result, Err(MappingError::Io { .. })));
    }
}
