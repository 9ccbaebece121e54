//! Typed attribute records
//!
//! Every vendor returns product data in its own shape; this module provides
//! the uniform container the rest of the engine works with. A vendor declares
//! a closed, ordered schema (`&'static [AttrSpec]`) and each scrape produces
//! one `ItemRecord` whose values are validated against that schema.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Key of the attribute carrying the product image URL.
///
/// It has no label, is never part of field-diff rendering and is routed
/// separately (e.g. as a message thumbnail).
pub const THUMBNAIL_KEY: &str = "thumbnail";

/// Value shape of one attribute, fixed per key for the lifetime of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttrKind {
    Text,
    Int,
    List,
    Map,
}

/// One attribute value. Deep equality; `Map` uses a `BTreeMap` so that
/// sub-key iteration (and therefore diff rendering) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl AttrValue {
    /// The kind this value satisfies.
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Text(_) => AttrKind::Text,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::List(_) => AttrKind::List,
            AttrValue::Map(_) => AttrKind::Map,
        }
    }

    /// Default (empty) value for a kind.
    pub fn empty(kind: AttrKind) -> Self {
        match kind {
            AttrKind::Text => AttrValue::Text(String::new()),
            AttrKind::Int => AttrValue::Int(0),
            AttrKind::List => AttrValue::List(Vec::new()),
            AttrKind::Map => AttrValue::Map(BTreeMap::new()),
        }
    }

    /// Empty string, zero, or empty collection. Empty unchanged fields are
    /// omitted from rendering to reduce noise.
    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Text(s) => s.is_empty(),
            AttrValue::Int(n) => *n == 0,
            AttrValue::List(v) => v.is_empty(),
            AttrValue::Map(m) => m.is_empty(),
        }
    }

    /// Human-readable form: lists joined with `", "`, maps joined with
    /// `" / "` as `key: value` pairs.
    pub fn display(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Int(n) => n.to_string(),
            AttrValue::List(v) => v.join(", "),
            AttrValue::Map(m) => m
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(" / "),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::List(v)
    }
}

impl From<BTreeMap<String, String>> for AttrValue {
    fn from(m: BTreeMap<String, String>) -> Self {
        AttrValue::Map(m)
    }
}

/// Schema entry for one attribute of one vendor.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpec {
    /// Stable identifier, e.g. `price`, `option`, `quantity`.
    pub key: &'static str,
    /// Display name. `None` means the attribute is never rendered directly.
    pub label: Option<&'static str>,
    /// Unit suffix appended when rendering, e.g. `원`, `%`.
    pub unit: Option<&'static str>,
    /// Fixed value shape.
    pub kind: AttrKind,
}

impl AttrSpec {
    pub const fn new(key: &'static str, label: &'static str, kind: AttrKind) -> Self {
        Self {
            key,
            label: Some(label),
            unit: None,
            kind,
        }
    }

    pub const fn with_unit(
        key: &'static str,
        label: &'static str,
        kind: AttrKind,
        unit: &'static str,
    ) -> Self {
        Self {
            key,
            label: Some(label),
            unit: Some(unit),
            kind,
        }
    }

    /// Attribute without a display label (thumbnails, option maps whose
    /// sub-keys carry their own labels).
    pub const fn unlabeled(key: &'static str, kind: AttrKind) -> Self {
        Self {
            key,
            label: None,
            unit: None,
            kind,
        }
    }
}

/// Schema contract violation. These indicate a defect in an adapter, not a
/// runtime condition, and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown attribute key '{key}'")]
    UnknownKey { key: String },

    #[error("attribute '{key}' expects {expected:?}, got {got:?}")]
    TypeMismatch {
        key: String,
        expected: AttrKind,
        got: AttrKind,
    },
}

/// One product's full scraped state at one point in time.
///
/// Values are stored in schema declaration order; iteration order is stable,
/// which keeps diff output deterministic. Records are built fresh every
/// cycle and never mutated across cycles.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    schema: &'static [AttrSpec],
    values: Vec<AttrValue>,
}

impl ItemRecord {
    /// Create a record with every attribute set to its empty value.
    pub fn new(schema: &'static [AttrSpec]) -> Self {
        let values = schema.iter().map(|spec| AttrValue::empty(spec.kind)).collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &'static [AttrSpec] {
        self.schema
    }

    fn index_of(&self, key: &str) -> Result<usize, SchemaError> {
        self.schema
            .iter()
            .position(|spec| spec.key == key)
            .ok_or_else(|| SchemaError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Result<&AttrValue, SchemaError> {
        Ok(&self.values[self.index_of(key)?])
    }

    /// Write a value, enforcing the declared kind.
    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) -> Result<(), SchemaError> {
        let value = value.into();
        let idx = self.index_of(key)?;
        let expected = self.schema[idx].kind;

        if value.kind() != expected {
            return Err(SchemaError::TypeMismatch {
                key: key.to_string(),
                expected,
                got: value.kind(),
            });
        }

        self.values[idx] = value;
        Ok(())
    }

    /// Attributes in schema declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&AttrSpec, &AttrValue)> {
        self.schema.iter().zip(self.values.iter())
    }

    /// The routed-separately image URL, if the schema declares one and it
    /// is non-empty.
    pub fn thumbnail(&self) -> Option<&str> {
        match self.get(THUMBNAIL_KEY) {
            Ok(AttrValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// Labels and kinds are schema-fixed; equality compares values only.
impl PartialEq for ItemRecord {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema.as_ptr(), other.schema.as_ptr()) && self.values == other.values
    }
}

impl Eq for ItemRecord {}
