//! Persistence backends for journal documents.
//!
//! A local JSON [`FileSink`] and a best-effort [`RemoteSink`] that appends to
//! an external document store through the [`DocumentStore`] interface.

mod config;
mod file;
mod memory;
mod remote;
mod traits;

pub use config::{JournalConfig, RemoteConfig};
pub use file::FileSink;
pub use memory::{MemoryDocumentStore, StoredRecord};
pub use remote::{RemoteOutcome, RemoteSink};
pub use traits::{DocumentStore, RecordId, StoreSession};
