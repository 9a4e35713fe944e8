//! Ready-made watcher contributing a journal fragment.

use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::registry::{SlotTable, Watcher, WatcherId};

use super::NOTIFY_SLOT;

/// A watcher whose `journal.notify` slot calls a report closure.
///
/// Types with their own state usually implement [`Watcher`] directly; this
/// covers the common case of a closure over shared state.
///
/// ```
/// use telejournal::{Document, JournalWatcher};
///
/// let mesh = JournalWatcher::new("mesh", || {
///     let mut doc = Document::new();
///     doc.put("mesh.n", 100);
///     doc
/// });
/// assert_eq!(mesh.label(), "mesh");
/// ```
pub struct JournalWatcher {
    id: WatcherId,
    label: String,
    slots: SlotTable,
    shared: Option<Arc<SlotTable>>,
}

impl JournalWatcher {
    /// Watcher labelled `label` whose instance slot returns `report()`.
    pub fn new<F>(label: impl Into<String>, report: F) -> Self
    where
        F: Fn() -> Document + Send + Sync + 'static,
    {
        Self {
            id: WatcherId::new(),
            label: label.into(),
            slots: SlotTable::new().with(NOTIFY_SLOT, move |(): &()| report()),
            shared: None,
        }
    }

    /// A slot table holding one `journal.notify` slot, to be shared between
    /// watchers with [`with_static_slots`](Self::with_static_slots).
    #[must_use]
    pub fn static_table<F>(report: F) -> Arc<SlotTable>
    where
        F: Fn() -> Document + Send + Sync + 'static,
    {
        Arc::new(SlotTable::new().with(NOTIFY_SLOT, move |(): &()| report()))
    }

    /// Attach a shared static slot table.
    #[must_use]
    pub fn with_static_slots(mut self, table: Arc<SlotTable>) -> Self {
        self.shared = Some(table);
        self
    }

    /// Unique id of this watcher.
    #[must_use]
    pub const fn id(&self) -> WatcherId {
        self.id
    }

    /// Label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Watcher for JournalWatcher {
    fn watcher_id(&self) -> WatcherId {
        self.id
    }

    fn slots(&self) -> &SlotTable {
        &self.slots
    }

    fn static_slots(&self) -> Option<&SlotTable> {
        self.shared.as_deref()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for JournalWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalWatcher")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("static_slots", &self.shared.is_some())
            .finish()
    }
}
