//! In-memory document store.
//!
//! Thread-safe implementation of [`DocumentStore`] for embedded use and
//! tests. It records every connection attempt and inserted record and can be
//! told to refuse connections or to stall, which makes it a convenient fake
//! transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::error::PersistError;

use super::config::RemoteConfig;
use super::traits::{DocumentStore, RecordId, StoreSession};

/// A record held by [`MemoryDocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Id assigned at insert.
    pub id: RecordId,
    /// Target database.
    pub database: String,
    /// Target collection.
    pub collection: String,
    /// Inserted document.
    pub document: Value,
}

#[derive(Debug, Default)]
struct Inner {
    records: Mutex<Vec<StoredRecord>>,
    connect_attempts: AtomicU64,
    refuse_connections: AtomicBool,
    latency_ms: AtomicU64,
}

/// Shared in-process store; clones see the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl MemoryDocumentStore {
    /// Empty store accepting connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail (or succeed again).
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::Release);
    }

    /// Delay every `connect` by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::Release);
    }

    /// Number of `connect` calls made so far, successful or not.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::Acquire)
    }

    /// Every record inserted, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records inserted into one `database.collection`.
    #[must_use]
    pub fn records_in(&self, database: &str, collection: &str) -> Vec<StoredRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.database == database && r.collection == collection)
            .collect()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn StoreSession>, PersistError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::AcqRel);

        let latency = self.inner.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency));
        }

        if self.inner.refuse_connections.load(Ordering::Acquire) {
            return Err(PersistError::RemoteConnect {
                target: config.redacted_uri(),
                message: "connection refused".to_string(),
            });
        }

        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemorySession {
    inner: Arc<Inner>,
}

impl StoreSession for MemorySession {
    fn insert_one(
        &mut self,
        database: &str,
        collection: &str,
        record: &Value,
    ) -> Result<RecordId, PersistError> {
        if !record.is_object() {
            return Err(PersistError::RemoteInsert {
                database: database.to_string(),
                collection: collection.to_string(),
                message: "record must be a document".to_string(),
            });
        }

        let id = RecordId::new(Uuid::new_v4().to_string());
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredRecord {
                id: id.clone(),
                database: database.to_string(),
                collection: collection.to_string(),
                document: record.clone(),
            });
        Ok(id)
    }
}
