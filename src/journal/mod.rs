//! Journal aggregation: collect fragments from watchers, merge them into one
//! document, persist it.
//!
//! Every [`JournalAggregator`] shares the process-scope channel
//! [`COLLECT_CHANNEL`]. Watchers attach a `() -> Document` slot named
//! [`NOTIFY_SLOT`]; a collection cycle invokes the channel and folds the
//! returned fragments, in registration order, over fresh schema metadata.

mod aggregator;
mod document;
mod watcher;

pub use aggregator::{CycleState, JournalAggregator, JournalAggregatorBuilder, SaveReport};
pub use document::{CaptureTime, JournalDocument, SchemaMetadata};
pub use watcher::JournalWatcher;

/// Name of the process-scope channel fired by a collection cycle.
pub const COLLECT_CHANNEL: &str = "journal.collect";

/// Slot name watchers expose to contribute a fragment.
pub const NOTIFY_SLOT: &str = "journal.notify";

/// Version tag written under `schema.version`.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Top-level key holding the schema metadata.
pub const SCHEMA_KEY: &str = "schema";
