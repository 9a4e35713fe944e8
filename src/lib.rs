//! # telejournal - typed event channels and a telemetry journal
//!
//! Independent components ("watchers") publish structured report fragments
//! when a well-known channel fires. An aggregator collects every fragment,
//! merges them into one hierarchical document and persists it to a local JSON
//! file and, optionally, an external document store.
//!
//! ## Core Concepts
//!
//! - **Document**: an ordered key/value tree with dotted-path access and
//!   path-wise merge
//! - **EventRegistry**: name-keyed typed channels with checked signatures, in
//!   an instance scope (one per [`EventHub`]) and a shared process scope
//! - **Watcher**: an object exposing named slots that channels call
//! - **JournalAggregator**: drives the collect → merge → persist cycle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use telejournal::{Document, JournalAggregator, JournalWatcher};
//!
//! let journal = JournalAggregator::new()?;
//! let mesh = JournalWatcher::new("mesh", || {
//!     let mut doc = Document::new();
//!     doc.put("mesh.n", 100);
//!     doc
//! });
//! journal.register_watcher(&mesh)?;
//!
//! journal.collect()?;
//! journal.save(Some(Path::new("run1")))?;
//! # Ok::<(), telejournal::JournalError>(())
//! ```
//!
//! The library logs through `tracing` and never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod document;
pub mod error;
pub mod journal;
pub mod registry;
pub mod storage;

pub use document::{Document, Fragment};
pub use error::{JournalError, JournalResult, PersistError, RegistryError, ValidationError};
pub use journal::{
    CaptureTime, CycleState, JournalAggregator, JournalAggregatorBuilder, JournalDocument,
    JournalWatcher, SaveReport, SchemaMetadata,
};
pub use registry::{
    global, CancellationToken, ChannelHandle, ChannelInfo, EventHub, EventRegistry,
    InvokeOptions, Scope, Signature, Slot, SlotKind, SlotTable, Watcher, WatcherId,
};
pub use storage::{
    DocumentStore, FileSink, JournalConfig, MemoryDocumentStore, RecordId, RemoteConfig,
    RemoteOutcome, RemoteSink, StoreSession,
};
