//! Edit transactions.
//!
//! An [`EditBatch`] collects pending `(key path, value)` changes, the way a
//! GUI tracks modifications before saving. [`apply_batch`] validates the whole
//! batch first and only then produces a new document, so a batch either
//! applies completely or not at all. Edits only ever replace leaf values.

use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::document::{SaveDocument, Scalar};
use crate::index::{Index, IndexError};
use crate::mapping::{Schema, ValueKind};
use crate::path::KeyPath;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Unknown key: {key}")]
    UnknownKey { key: String },

    #[error("Type mismatch at {key}: expected {expected}, got '{value}'")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        value: String,
    },

    #[error("Edited document could not be re-indexed: {0}")]
    Reindex(#[from] IndexError),
}

/// A proposed new value for a leaf
#[derive(Debug, Clone, PartialEq)]
pub enum EditValue {
    /// Text as typed by the user, coerced to the declared kind
    Text(String),
    /// An already typed value
    Scalar(Scalar),
}

impl fmt::Display for EditValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditValue::Text(text) => f.write_str(text),
            EditValue::Scalar(scalar) => write!(f, "{}", scalar),
        }
    }
}

impl From<&str> for EditValue {
    fn from(text: &str) -> Self {
        EditValue::Text(text.to_string())
    }
}

impl From<Scalar> for EditValue {
    fn from(scalar: Scalar) -> Self {
        EditValue::Scalar(scalar)
    }
}

/// Ordered set of pending edits; adding the same key again replaces its value
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EditBatch {
    changes: Vec<(String, EditValue)>,
}

impl EditBatch {
    pub fn new() -> Self {
        EditBatch::default()
    }

    /// Add a change to the batch
    pub fn add(&mut self, key: &str, value: impl Into<EditValue>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.changes.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.changes.push((key, value)),
        }
    }

    /// Builder form of [`EditBatch::add`]
    pub fn with(mut self, key: &str, value: impl Into<EditValue>) -> Self {
        self.add(key, value);
        self
    }

    pub fn has_change(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.changes.iter().any(|(k, _)| *k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<EditValue> {
        let key = normalize_key(key);
        let position = self.changes.iter().position(|(k, _)| *k == key)?;
        Some(self.changes.remove(position).1)
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EditValue)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parsed paths are compared in their normalized spelling; text that does
/// not parse is kept as-is and will be reported as an unknown key.
fn normalize_key(key: &str) -> String {
    KeyPath::parse(key.trim())
        .map(|path| path.to_string())
        .unwrap_or_else(|_| key.to_string())
}

/// Apply a batch to `document`, returning the edited copy.
///
/// `index` must have been built from `document`. Each value is coerced to
/// the kind declared by the governing mapping entry; leaves that are
/// unmapped or declared opaque keep the type they already have. If any edit
/// fails, nothing is applied and the original document is untouched.
pub fn apply_batch(
    document: &SaveDocument,
    index: &Index,
    schema: &Schema,
    batch: &EditBatch,
) -> Result<SaveDocument, EditError> {
    let mut resolved = Vec::with_capacity(batch.len());
    for (key, value) in batch.iter() {
        let entry = index.get(key).ok_or_else(|| EditError::UnknownKey {
            key: key.to_string(),
        })?;
        let declared = schema
            .lookup_in(document, &entry.path)
            .map_or(ValueKind::Opaque, |(_, mapping)| mapping.value_kind);
        let coerced = coerce(value, declared, &entry.value).ok_or_else(|| {
            EditError::TypeMismatch {
                key: key.to_string(),
                expected: effective_kind(declared, &entry.value),
                value: value.to_string(),
            }
        })?;
        resolved.push((&entry.path, coerced));
    }

    let mut edited = document.clone();
    for (path, value) in resolved {
        debug!(key = %path, value = %value, "Applying edit");
        if edited.replace_leaf(path, value).is_none() {
            return Err(EditError::UnknownKey {
                key: path.to_string(),
            });
        }
    }
    debug_assert!(edited.root().same_shape(document.root()));

    info!(edits = batch.len(), "Committed edit batch");
    Ok(edited)
}

fn effective_kind(declared: ValueKind, current: &Scalar) -> ValueKind {
    match declared {
        ValueKind::Opaque => current.kind(),
        kind => kind,
    }
}

/// Coerce a proposed value to the declared kind, or to the current value's
/// runtime type when the declared kind is opaque.
fn coerce(value: &EditValue, declared: ValueKind, current: &Scalar) -> Option<Scalar> {
    match effective_kind(declared, current) {
        ValueKind::Integer => coerce_integer(value),
        ValueKind::Float => coerce_float(value),
        ValueKind::Boolean => coerce_boolean(value),
        ValueKind::String => match value {
            EditValue::Text(text) => Some(Scalar::String(text.clone())),
            EditValue::Scalar(Scalar::String(s)) => Some(Scalar::String(s.clone())),
            EditValue::Scalar(_) => None,
        },
        // Only a stored null reports opaque at runtime
        ValueKind::Opaque => match value {
            EditValue::Text(text) if text.trim() == "null" => Some(Scalar::Null),
            EditValue::Scalar(Scalar::Null) => Some(Scalar::Null),
            _ => None,
        },
    }
}

fn coerce_integer(value: &EditValue) -> Option<Scalar> {
    match value {
        EditValue::Text(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .map(Scalar::Int)
                .or_else(|_| text.parse::<u64>().map(Scalar::UInt))
                .ok()
        }
        EditValue::Scalar(scalar) => match scalar {
            Scalar::Int(_) | Scalar::UInt(_) => Some(scalar.clone()),
            Scalar::Float(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => Some(Scalar::Int(*x as i64)),
            _ => None,
        },
    }
}

fn coerce_float(value: &EditValue) -> Option<Scalar> {
    let x = match value {
        EditValue::Text(text) => text.trim().parse::<f64>().ok()?,
        EditValue::Scalar(Scalar::Float(x)) => *x,
        EditValue::Scalar(Scalar::Int(n)) => *n as f64,
        EditValue::Scalar(Scalar::UInt(n)) => *n as f64,
        EditValue::Scalar(_) => return None,
    };
    x.is_finite().then_some(Scalar::Float(x))
}

fn coerce_boolean(value: &EditValue) -> Option<Scalar> {
    match value {
        EditValue::Text(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                Some(Scalar::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Some(Scalar::Bool(false))
            } else {
                None
            }
        }
        EditValue::Scalar(Scalar::Bool(b)) => Some(Scalar::Bool(*b)),
        EditValue::Scalar(_) => None,
    }
}
