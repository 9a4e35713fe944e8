//! Client interface for the external document store.
//!
//! The journal never links a concrete store client. A `DocumentStore` opens
//! sessions from a [`RemoteConfig`]; a session appends records. Implementations
//! must be usable from a helper thread.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistError;

use super::config::RemoteConfig;

/// Identifier a store assigns to an inserted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a store-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Factory for store sessions.
pub trait DocumentStore: Send + Sync {
    /// Open a session using the connection parameters in `config`.
    ///
    /// # Errors
    /// `PersistError::RemoteConnect` when the store is unreachable or rejects
    /// the credentials.
    fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn StoreSession>, PersistError>;
}

/// An open connection to the store.
pub trait StoreSession: Send {
    /// Append one new record. Never updates an existing record.
    fn insert_one(
        &mut self,
        database: &str,
        collection: &str,
        record: &Value,
    ) -> Result<RecordId, PersistError>;
}
