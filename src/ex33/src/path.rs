//! Key paths addressing locations inside a save document.
//!
//! A key path is written the same way the editor shows it to users:
//! object keys joined with dots and array positions in brackets,
//! e.g. `root.properties.InventoryItems_0.Map[3].value.Int`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Key path is empty")]
    Empty,

    #[error("Unclosed '[' in key path: {0}")]
    UnclosedBracket(String),

    #[error("Empty segment in key path: {0}")]
    EmptySegment(String),

    #[error("Unexpected '{ch}' in key path: {path}")]
    UnexpectedChar { path: String, ch: char },

    #[error("Invalid array index '{index}' in key path: {path}")]
    InvalidIndex { path: String, index: String },

    #[error("Invalid selector '[{selector}]' in key pattern: {path}")]
    InvalidSelector { path: String, selector: String },
}

/// One step of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Named member of an object
    Key(String),
    /// Position inside an array
    Index(usize),
}

/// Ordered sequence of segments from the document root to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    /// The empty path, addressing the document root
    pub fn root() -> Self {
        KeyPath(Vec::new())
    }

    /// Parse a dotted/bracketed path such as `player.items[0].name`
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let segments = split_segments(path)?
            .into_iter()
            .map(|raw| match raw {
                RawSegment::Key(key) => Ok(Segment::Key(key.to_string())),
                RawSegment::Bracket(index) => {
                    index
                        .parse()
                        .map(Segment::Index)
                        .map_err(|_| PathError::InvalidIndex {
                            path: path.to_string(),
                            index: index.to_string(),
                        })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeyPath(segments))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path extended by an object key
    pub fn child_key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        KeyPath(segments)
    }

    /// Path extended by an array position
    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        KeyPath(segments)
    }

    /// Short label for the addressed node: the last key, with any trailing
    /// array positions kept (`Map[3]` rather than just `[3]`).
    pub fn leaf_label(&self) -> String {
        let start = self
            .0
            .iter()
            .rposition(|s| matches!(s, Segment::Key(_)))
            .unwrap_or(0);
        KeyPath(self.0[start..].to_vec()).to_string()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPath::parse(s)
    }
}

impl From<Vec<Segment>> for KeyPath {
    fn from(segments: Vec<Segment>) -> Self {
        KeyPath(segments)
    }
}

/// Lexical segment shared by key paths and mapping patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawSegment<'a> {
    Key(&'a str),
    Bracket(&'a str),
}

/// Split a path into raw key and bracket segments without interpreting them
pub(crate) fn split_segments(path: &str) -> Result<Vec<RawSegment<'_>>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let bytes = path.as_bytes();
    let empty = || PathError::EmptySegment(path.to_string());
    let mut segments = Vec::new();
    let mut pos = 0;
    // A '.' must be followed by a key, never by '[' or the end of input
    let mut expect_key = false;

    while pos < bytes.len() {
        if bytes[pos] == b'[' {
            if expect_key {
                return Err(empty());
            }
            let close = path[pos..]
                .find(']')
                .map(|offset| pos + offset)
                .ok_or_else(|| PathError::UnclosedBracket(path.to_string()))?;
            let inner = &path[pos + 1..close];
            if inner.contains('[') {
                return Err(PathError::UnclosedBracket(path.to_string()));
            }
            segments.push(RawSegment::Bracket(inner));
            pos = close + 1;
        } else {
            let end = path[pos..]
                .find(['.', '[', ']'])
                .map_or(bytes.len(), |offset| pos + offset);
            if end == pos {
                return match bytes[pos] {
                    b']' => Err(PathError::UnexpectedChar {
                        path: path.to_string(),
                        ch: ']',
                    }),
                    _ => Err(empty()),
                };
            }
            segments.push(RawSegment::Key(&path[pos..end]));
            expect_key = false;
            pos = end;
        }

        match bytes.get(pos) {
            None | Some(b'[') => {}
            Some(b'.') => {
                pos += 1;
                expect_key = true;
                if pos == bytes.len() {
                    return Err(empty());
                }
            }
            Some(&other) => {
                return Err(PathError::UnexpectedChar {
                    path: path.to_string(),
                    ch: other as char,
                })
            }
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let path = KeyPath::parse("player.level").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("player".into()),
                Segment::Key("level".into())
            ]
        );
    }

    #[test]
    fn test_parse_array_positions() {
        let path = KeyPath::parse("state.experience[0].points").unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.segments()[2], Segment::Index(0));
    }

    #[test]
    fn test_parse_nested_arrays_and_root_array() {
        let path = KeyPath::parse("[1][2].x").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Index(1),
                Segment::Index(2),
                Segment::Key("x".into())
            ]
        );
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["a", "a.b.c", "a[0]", "a[0].b[12][3].c", "[0].x"] {
            assert_eq!(KeyPath::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert_eq!(KeyPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            KeyPath::parse("a..b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            KeyPath::parse("a."),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            KeyPath::parse(".a"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            KeyPath::parse("a.[0]"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            KeyPath::parse("a[0"),
            Err(PathError::UnclosedBracket(_))
        ));
        assert!(matches!(
            KeyPath::parse("a[0]b"),
            Err(PathError::UnexpectedChar { ch: 'b', .. })
        ));
        assert!(matches!(
            KeyPath::parse("a]"),
            Err(PathError::UnexpectedChar { ch: ']', .. })
        ));
        assert!(matches!(
            KeyPath::parse("a[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_child_paths() {
        let base = KeyPath::parse("inventory").unwrap();
        assert_eq!(base.child_index(2).child_key("name").to_string(), "inventory[2].name");
        assert_eq!(KeyPath::root().child_key("a").to_string(), "a");
    }

    #[test]
    fn test_leaf_label() {
        assert_eq!(KeyPath::parse("player.secretFlag").unwrap().leaf_label(), "secretFlag");
        assert_eq!(KeyPath::parse("inv.Map[3]").unwrap().leaf_label(), "Map[3]");
        assert_eq!(KeyPath::parse("[0][1]").unwrap().leaf_label(), "[0][1]");
    }
}
