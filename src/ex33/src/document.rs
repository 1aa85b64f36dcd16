//! In-memory save document.
//!
//! The external converter turns a binary `.sav` into JSON; this module holds
//! that JSON as a tree of [`SaveNode`]s that keeps object member order, so a
//! load/save cycle without edits writes the same document back.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::index::IndexError;
use crate::mapping::ValueKind;
use crate::path::{KeyPath, Segment};

/// Serialization format of a structured save document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from a file extension (`.yaml`/`.yml` are YAML, anything else JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// A leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Runtime kind of this value; `null` has no meaningful kind and reports opaque
    pub fn kind(&self) -> ValueKind {
        match self {
            Scalar::Null => ValueKind::Opaque,
            Scalar::Bool(_) => ValueKind::Boolean,
            Scalar::Int(_) | Scalar::UInt(_) => ValueKind::Integer,
            Scalar::Float(_) => ValueKind::Float,
            Scalar::String(_) => ValueKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::UInt(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

/// A node in the save document tree
#[derive(Debug, Clone, PartialEq)]
pub enum SaveNode {
    Scalar(Scalar),
    /// Object members in document order
    Object(Vec<(String, SaveNode)>),
    Array(Vec<SaveNode>),
}

impl SaveNode {
    /// Build a node tree from parsed YAML.
    ///
    /// Tagged values and non-string mapping keys have no place in a save
    /// document and are rejected.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, IndexError> {
        from_yaml_at(value, &KeyPath::root())
    }

    /// Convert back to JSON. Non-finite floats cannot be represented and are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value, IndexError> {
        to_json_at(self, &KeyPath::root())
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            SaveNode::Scalar(scalar) => match scalar {
                Scalar::Null => serde_yaml::Value::Null,
                Scalar::Bool(b) => serde_yaml::Value::Bool(*b),
                Scalar::Int(n) => serde_yaml::Value::Number((*n).into()),
                Scalar::UInt(n) => serde_yaml::Value::Number((*n).into()),
                Scalar::Float(x) => serde_yaml::Value::Number(serde_yaml::Number::from(*x)),
                Scalar::String(s) => serde_yaml::Value::String(s.clone()),
            },
            SaveNode::Array(items) => {
                serde_yaml::Value::Sequence(items.iter().map(SaveNode::to_yaml).collect())
            }
            SaveNode::Object(members) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (key, node) in members {
                    mapping.insert(serde_yaml::Value::String(key.clone()), node.to_yaml());
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            SaveNode::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Member of an object by name
    pub fn member(&self, key: &str) -> Option<&SaveNode> {
        match self {
            SaveNode::Object(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn member_mut(&mut self, key: &str) -> Option<&mut SaveNode> {
        match self {
            SaveNode::Object(members) => members
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    fn step(&self, segment: &Segment) -> Option<&SaveNode> {
        match (segment, self) {
            (Segment::Key(key), _) => self.member(key),
            (Segment::Index(index), SaveNode::Array(items)) => items.get(*index),
            _ => None,
        }
    }

    fn step_mut(&mut self, segment: &Segment) -> Option<&mut SaveNode> {
        match segment {
            Segment::Key(key) => self.member_mut(key),
            Segment::Index(index) => match self {
                SaveNode::Array(items) => items.get_mut(*index),
                _ => None,
            },
        }
    }

    /// True when both trees have the same objects, keys, and array lengths,
    /// ignoring scalar values.
    pub fn same_shape(&self, other: &SaveNode) -> bool {
        match (self, other) {
            (SaveNode::Scalar(_), SaveNode::Scalar(_)) => true,
            (SaveNode::Array(a), SaveNode::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            (SaveNode::Object(a), SaveNode::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same_shape(vb))
            }
            _ => false,
        }
    }
}

/// JSON parsed straight into a node tree. Unlike `serde_json::Value`, repeated
/// object keys are all kept, so they can be reported instead of collapsing.
struct JsonTree(SaveNode);

impl<'de> Deserialize<'de> for JsonTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JsonTreeVisitor).map(JsonTree)
    }
}

struct JsonTreeVisitor;

impl<'de> Visitor<'de> for JsonTreeVisitor {
    type Value = SaveNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::Null))
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::Bool(b)))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::Int(n)))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(match i64::try_from(n) {
            Ok(i) => Scalar::Int(i),
            Err(_) => Scalar::UInt(n),
        }))
    }

    fn visit_f64<E: de::Error>(self, x: f64) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::Float(x)))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::String(s.to_string())))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<SaveNode, E> {
        Ok(SaveNode::Scalar(Scalar::String(s)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SaveNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(JsonTree(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(SaveNode::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SaveNode, A::Error> {
        let mut members = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, JsonTree(value))) = map.next_entry::<String, JsonTree>()? {
            members.push((key, value));
        }
        Ok(SaveNode::Object(members))
    }
}

/// Reject objects that repeat a member name; writing them back would drop data
fn reject_duplicate_members(node: &SaveNode, at: &KeyPath) -> Result<(), IndexError> {
    match node {
        SaveNode::Scalar(_) => Ok(()),
        SaveNode::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| reject_duplicate_members(item, &at.child_index(i))),
        SaveNode::Object(members) => {
            let mut seen = HashSet::with_capacity(members.len());
            for (key, item) in members {
                if !seen.insert(key.as_str()) {
                    return Err(IndexError::UnsupportedNode {
                        path: at.to_string(),
                        reason: format!("duplicate object key '{}'", key),
                    });
                }
                reject_duplicate_members(item, &at.child_key(key))?;
            }
            Ok(())
        }
    }
}

fn from_yaml_at(value: &serde_yaml::Value, at: &KeyPath) -> Result<SaveNode, IndexError> {
    let node = match value {
        serde_yaml::Value::Null => SaveNode::Scalar(Scalar::Null),
        serde_yaml::Value::Bool(b) => SaveNode::Scalar(Scalar::Bool(*b)),
        serde_yaml::Value::Number(n) => SaveNode::Scalar(if let Some(i) = n.as_i64() {
            Scalar::Int(i)
        } else if let Some(u) = n.as_u64() {
            Scalar::UInt(u)
        } else {
            Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
        }),
        serde_yaml::Value::String(s) => SaveNode::Scalar(Scalar::String(s.clone())),
        serde_yaml::Value::Sequence(items) => SaveNode::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| from_yaml_at(item, &at.child_index(i)))
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut members = Vec::with_capacity(mapping.len());
            for (key, item) in mapping {
                let Some(key) = key.as_str() else {
                    return Err(IndexError::UnsupportedNode {
                        path: at.to_string(),
                        reason: format!("non-string mapping key {:?}", key),
                    });
                };
                members.push((key.to_string(), from_yaml_at(item, &at.child_key(key))?));
            }
            SaveNode::Object(members)
        }
        serde_yaml::Value::Tagged(tagged) => {
            return Err(IndexError::UnsupportedNode {
                path: at.to_string(),
                reason: format!("tagged value {}", tagged.tag),
            })
        }
    };
    Ok(node)
}

fn to_json_at(node: &SaveNode, at: &KeyPath) -> Result<serde_json::Value, IndexError> {
    let value = match node {
        SaveNode::Scalar(scalar) => match scalar {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(n) => serde_json::Value::Number((*n).into()),
            Scalar::UInt(n) => serde_json::Value::Number((*n).into()),
            Scalar::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .ok_or_else(|| IndexError::UnsupportedNode {
                    path: at.to_string(),
                    reason: format!("float {} cannot be written as JSON", x),
                })?,
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        },
        SaveNode::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_json_at(item, &at.child_index(i)))
                .collect::<Result<_, _>>()?,
        ),
        SaveNode::Object(members) => {
            let mut map = serde_json::Map::with_capacity(members.len());
            for (key, item) in members {
                map.insert(key.clone(), to_json_at(item, &at.child_key(key))?);
            }
            serde_json::Value::Object(map)
        }
    };
    Ok(value)
}

/// A loaded save document together with the format it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SaveDocument {
    root: SaveNode,
    format: DocumentFormat,
}

impl SaveDocument {
    pub fn new(root: SaveNode, format: DocumentFormat) -> Self {
        SaveDocument { root, format }
    }

    /// Parse document bytes in the given format
    pub fn parse(data: &[u8], format: DocumentFormat) -> Result<Self, IndexError> {
        match format {
            DocumentFormat::Json => Self::from_json(data),
            DocumentFormat::Yaml => Self::from_yaml(data),
        }
    }

    /// Parse JSON. Objects that repeat a key are rejected.
    pub fn from_json(data: &[u8]) -> Result<Self, IndexError> {
        let JsonTree(root) = serde_json::from_slice(data)?;
        reject_duplicate_members(&root, &KeyPath::root())?;
        Ok(SaveDocument {
            root,
            format: DocumentFormat::Json,
        })
    }

    pub fn from_yaml(data: &[u8]) -> Result<Self, IndexError> {
        let value: serde_yaml::Value = serde_yaml::from_slice(data)?;
        Ok(SaveDocument {
            root: SaveNode::from_yaml(&value)?,
            format: DocumentFormat::Yaml,
        })
    }

    /// Serialize in the document's own format (JSON is pretty-printed with two-space indent)
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        match self.format {
            DocumentFormat::Json => {
                let mut out = serde_json::to_vec_pretty(&self.root.to_json()?)?;
                out.push(b'\n');
                Ok(out)
            }
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(&self.root.to_yaml())?.into_bytes()),
        }
    }

    pub fn root(&self) -> &SaveNode {
        &self.root
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Node at a key path
    pub fn get(&self, path: &KeyPath) -> Option<&SaveNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |current, segment| current.step(segment))
    }

    /// Scalar at a key path, if the path addresses a leaf
    pub fn leaf(&self, path: &KeyPath) -> Option<&Scalar> {
        self.get(path).and_then(SaveNode::as_scalar)
    }

    /// Replace the scalar at `path`, returning the previous value.
    ///
    /// Only existing leaves can be replaced; containers and missing paths
    /// return `None` and leave the tree unchanged.
    pub(crate) fn replace_leaf(&mut self, path: &KeyPath, value: Scalar) -> Option<Scalar> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current.step_mut(segment)?;
        }
        match current {
            SaveNode::Scalar(old) => Some(std::mem::replace(old, value)),
            _ => None,
        }
    }
}
