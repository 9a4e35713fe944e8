//! Hierarchical key/value documents.
//!
//! A [`Document`] is an ordered tree of string keys mapping to scalars or
//! nested documents. Watchers return one as their fragment for a collection
//! cycle and the journal aggregator folds them together with
//! [`Document::merge`].
//!
//! Keys keep insertion order so the serialized form is deterministic for a
//! given sequence of writes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator used by the dotted path helpers (`"mesh.stats.n"`).
pub const PATH_SEPARATOR: char = '.';

/// Ordered hierarchical document.
///
/// # Examples
///
/// ```
/// use telejournal::Document;
///
/// let mut doc = Document::new();
/// doc.put("mesh.n", 100);
/// doc.put("mesh.name", "cube");
///
/// assert_eq!(doc.get("mesh.n"), Some(&serde_json::json!(100)));
/// assert_eq!(doc.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

/// A fragment is the document one watcher returns during one cycle.
pub type Fragment = Document;

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a document from a JSON value; only objects are accepted.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Number of top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the document has no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Top-level keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Top-level entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Look up a value by dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Nested document at `path`, if that path holds an object.
    #[must_use]
    pub fn section(&self, path: &str) -> Option<Document> {
        self.get(path)
            .and_then(Value::as_object)
            .map(|m| Self(m.clone()))
    }

    /// Set the value at a dotted path, creating intermediate documents.
    ///
    /// A scalar sitting on an intermediate segment is replaced by a document.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let Some(leaf) = segments.pop() else {
            return;
        };

        let mut current = &mut self.0;
        for segment in segments {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            current = next;
        }
        current.insert(leaf.to_string(), value.into());
    }

    /// Remove and return the value at a dotted path.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let leaf = segments.pop()?;

        let mut current = &mut self.0;
        for segment in segments {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(leaf)
    }

    /// Fold `other` into `self` path by path.
    ///
    /// - a key absent here is inserted
    /// - a key holding a document on both sides is merged recursively
    /// - any other collision is won by `other`
    pub fn merge(&mut self, other: Document) {
        merge_maps(&mut self.0, other.0);
    }

    /// Pretty, insertion-ordered JSON text.
    pub fn to_pretty_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

fn merge_maps(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, incoming) in from {
        match (into.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_maps(existing, nested);
            }
            (Some(existing), incoming) => {
                *existing = incoming;
            }
            (None, incoming) => {
                into.insert(key, incoming);
            }
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("{}"),
        }
    }
}
