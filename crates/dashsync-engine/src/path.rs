//! One- and two-segment field paths into provider documents.

use std::fmt;

use dashsync_common::CellValue;
use serde_json::Value;

/// Written when a path does not resolve.
pub const MISSING: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Key(String),
    Nested(String, String),
}

/// A label with more than two `/`-separated segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTooDeep {
    pub segments: usize,
}

impl FieldPath {
    pub fn parse(label: &str) -> Result<Self, PathTooDeep> {
        let parts: Vec<&str> = label.split('/').collect();
        match parts.as_slice() {
            [key] => Ok(FieldPath::Key((*key).to_string())),
            [outer, inner] => Ok(FieldPath::Nested((*outer).to_string(), (*inner).to_string())),
            _ => Err(PathTooDeep {
                segments: parts.len(),
            }),
        }
    }

    pub fn lookup<'v>(&self, doc: &'v Value) -> Option<&'v Value> {
        match self {
            FieldPath::Key(key) => doc.get(key),
            FieldPath::Nested(outer, inner) => doc.get(outer)?.get(inner),
        }
    }

    /// The value at this path, or [`MISSING`] (JSON `null` included).
    pub fn resolve(&self, doc: &Value) -> CellValue {
        match self.lookup(doc) {
            Some(v) if !v.is_null() => CellValue::from_json(v),
            _ => CellValue::text(MISSING),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Key(key) => f.write_str(key),
            FieldPath::Nested(outer, inner) => write!(f, "{outer}/{inner}"),
        }
    }
}
