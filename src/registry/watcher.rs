//! Watchers and the slots they expose.
//!
//! A watcher is any object that publishes named, typed callables ("slots").
//! The registry resolves a slot by name and signature when connecting it to a
//! channel. Slots come in two kinds: instance slots belong to one watcher
//! object, static slots are shared by every watcher of the same type.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

use super::signature::Signature;

/// Unique identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatcherId(Uuid);

impl WatcherId {
    /// Create a new random watcher id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a slot is resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// The watcher's own slot table.
    #[default]
    Instance,
    /// The table shared by all watchers of one type.
    Static,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("instance"),
            Self::Static => f.write_str("static"),
        }
    }
}

/// Callable behind a slot.
pub type SlotFn<A, R> = dyn Fn(&A) -> R + Send + Sync;

/// A named callable with its signature.
pub struct Slot {
    signature: Signature,
    // Holds an `Arc<SlotFn<A, R>>` matching `signature`.
    callable: Box<dyn Any + Send + Sync>,
}

impl Slot {
    /// Wrap a callable.
    pub fn new<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let callable: Arc<SlotFn<A, R>> = Arc::new(f);
        Self {
            signature: Signature::of::<A, R>(),
            callable: Box::new(callable),
        }
    }

    /// Signature of the wrapped callable.
    #[must_use]
    pub const fn signature(&self) -> Signature {
        self.signature
    }

    /// The callable, if it has signature `fn(&A) -> R`.
    #[must_use]
    pub fn typed<A: 'static, R: 'static>(&self) -> Option<Arc<SlotFn<A, R>>> {
        self.callable.downcast_ref::<Arc<SlotFn<A, R>>>().cloned()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("signature", &self.signature).finish_non_exhaustive()
    }
}

/// Name-keyed set of slots.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: BTreeMap<String, Slot>,
}

impl SlotTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a slot.
    pub fn insert<A, R, F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.slots.insert(name.into(), Slot::new(f));
        self
    }

    /// Builder form of [`SlotTable::insert`].
    #[must_use]
    pub fn with<A, R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    /// Slot registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Whether a slot named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Slot names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// An object exposing slots that can be attached to channels.
pub trait Watcher: Send + Sync {
    /// Identity used to key subscriptions.
    fn watcher_id(&self) -> WatcherId;

    /// Slots owned by this watcher.
    fn slots(&self) -> &SlotTable;

    /// Slots shared by every watcher of this type, if any.
    fn static_slots(&self) -> Option<&SlotTable> {
        None
    }

    /// Short human label for logs.
    fn label(&self) -> &str {
        "watcher"
    }
}

/// Resolve `name` on `watcher` as a `fn(&A) -> R` slot of the given kind.
pub(crate) fn resolve_slot<A: 'static, R: 'static>(
    watcher: &dyn Watcher,
    name: &str,
    kind: SlotKind,
) -> Result<Arc<SlotFn<A, R>>, RegistryError> {
    let table = match kind {
        SlotKind::Instance => Some(watcher.slots()),
        SlotKind::Static => watcher.static_slots(),
    };

    let slot = table
        .and_then(|t| t.get(name))
        .ok_or_else(|| RegistryError::SlotNotFound {
            watcher: watcher.watcher_id(),
            slot: name.to_string(),
            kind,
        })?;

    slot.typed::<A, R>().ok_or_else(|| RegistryError::TypeMismatch {
        name: name.to_string(),
        expected: Signature::of::<A, R>(),
        found: slot.signature(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gauge {
        id: WatcherId,
        slots: SlotTable,
    }

    impl Watcher for Gauge {
        fn watcher_id(&self) -> WatcherId {
            self.id
        }

        fn slots(&self) -> &SlotTable {
            &self.slots
        }
    }

    fn gauge() -> Gauge {
        Gauge {
            id: WatcherId::new(),
            slots: SlotTable::new().with("double", |x: &u32| x * 2),
        }
    }

    #[test]
    fn test_resolve_instance_slot() {
        let g = gauge();
        let f = resolve_slot::<u32, u32>(&g, "double", SlotKind::Instance).unwrap();
        assert_eq!(f(&21), 42);
    }

    #[test]
    fn test_resolve_missing_slot() {
        let g = gauge();
        let err = resolve_slot::<u32, u32>(&g, "triple", SlotKind::Instance)
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::SlotNotFound { .. }));
    }

    #[test]
    fn test_resolve_static_slot_absent_by_default() {
        let g = gauge();
        let err = resolve_slot::<u32, u32>(&g, "double", SlotKind::Static)
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::SlotNotFound { kind: SlotKind::Static, .. }));
    }

    #[test]
    fn test_resolve_wrong_signature() {
        let g = gauge();
        let err = resolve_slot::<u64, u32>(&g, "double", SlotKind::Instance)
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_slot_table_names_sorted() {
        let table = SlotTable::new()
            .with("b", |(): &()| 1u8)
            .with("a", |(): &()| 2u8);
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(table.len(), 2);
        assert!(table.contains("a"));
    }
}
