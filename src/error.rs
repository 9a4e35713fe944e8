//! Error types for telejournal.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Registry errors describe programmer or configuration
//! mistakes and are never retried; persistence errors carry the I/O or store
//! failure that caused them.

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::{Scope, Signature, SlotKind, WatcherId};

/// Errors raised by the event registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A channel with this name already exists.
    #[error("Channel '{name}' already exists in {scope} scope")]
    DuplicateChannel {
        /// Channel name.
        name: String,
        /// Scope searched.
        scope: Scope,
    },

    /// No channel with this name.
    #[error("Channel '{name}' not found in {scope} scope")]
    ChannelNotFound {
        /// Channel name.
        name: String,
        /// Scope searched.
        scope: Scope,
    },

    /// Requested types differ from the channel or slot signature.
    #[error("Type mismatch on '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Channel name.
        name: String,
        /// Signature asked for.
        expected: Signature,
        /// Signature present.
        found: Signature,
    },

    /// The watcher exposes no such slot.
    #[error("Watcher {watcher} has no {kind} slot named '{slot}'")]
    SlotNotFound {
        /// Watcher searched.
        watcher: WatcherId,
        /// Slot name.
        slot: String,
        /// Slot table searched.
        kind: SlotKind,
    },

    /// The invoke deadline passed between subscribers.
    #[error("Invoke of '{channel}' exceeded its deadline after {completed}/{total} subscribers")]
    DeadlineExceeded {
        /// Channel invoked.
        channel: String,
        /// Subscribers that ran.
        completed: usize,
        /// Subscribers registered.
        total: usize,
    },

    /// The invoke was cancelled between subscribers.
    #[error("Invoke of '{channel}' cancelled after {completed} subscribers")]
    Cancelled {
        /// Channel invoked.
        channel: String,
        /// Subscribers that ran.
        completed: usize,
    },

    /// A registry lock was poisoned by a panicking thread.
    #[error("Poisoned lock: {context}")]
    LockPoisoned {
        /// Operation holding the lock.
        context: &'static str,
    },
}

/// Errors raised while persisting a journal document.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the journal file failed.
    #[error("Failed to write {}: {source}", .path.display())]
    FileWrite {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a journal file failed.
    #[error("Failed to read {}: {source}", .path.display())]
    FileRead {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document store could not be reached.
    #[error("Remote store connection failed ({target}): {message}")]
    RemoteConnect {
        /// Redacted store URI.
        target: String,
        /// Failure detail.
        message: String,
    },

    /// The document store refused the record.
    #[error("Remote store insert into {database}.{collection} failed: {message}")]
    RemoteInsert {
        /// Target database.
        database: String,
        /// Target collection.
        collection: String,
        /// Failure detail.
        message: String,
    },

    /// The remote settings do not describe a usable endpoint.
    #[error("Remote store configuration rejected: {0}")]
    InvalidRemoteConfig(ValidationError),

    /// Connect and insert did not finish in time.
    #[error("Remote store write timed out after {duration_ms}ms")]
    RemoteTimeout {
        /// Time waited, in milliseconds.
        duration_ms: u64,
    },
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required text field is blank.
    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        /// Field name.
        field: &'static str,
    },

    /// Port 0 on an enabled remote.
    #[error("Port {port} is not a valid store port")]
    InvalidPort {
        /// Rejected port.
        port: u16,
    },

    /// The file stem cannot name a file.
    #[error("Invalid journal file stem '{stem}': {reason}")]
    InvalidFileStem {
        /// Rejected stem.
        stem: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Top-level error type for telejournal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Registry failure.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Persistence failure.
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Invalid configuration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Another collect or save is running.
    #[error("A collection cycle is already in progress")]
    CycleInProgress,

    /// Unexpected internal state.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl JournalError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if this is a persistence error.
    #[must_use]
    pub const fn is_persist(&self) -> bool {
        matches!(self, Self::Persist(_))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if repeating the call in a later cycle may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Registry(e) => matches!(
                e,
                RegistryError::DeadlineExceeded { .. } | RegistryError::Cancelled { .. }
            ),
            Self::Persist(e) => matches!(
                e,
                PersistError::FileWrite { .. }
                    | PersistError::RemoteConnect { .. }
                    | PersistError::RemoteTimeout { .. }
            ),
            Self::CycleInProgress => true,
            Self::Validation(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for telejournal operations.
pub type JournalResult<T> = Result<T, JournalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_channel_message() {
        let err = RegistryError::DuplicateChannel {
            name: "journal.collect".to_string(),
            scope: Scope::Process,
        };
        let msg = format!("{err}");
        assert!(msg.contains("journal.collect"));
        assert!(msg.contains("process"));
    }

    #[test]
    fn test_type_mismatch_names_both_signatures() {
        let err = RegistryError::TypeMismatch {
            name: "c".to_string(),
            expected: Signature::of::<(), u32>(),
            found: Signature::of::<String, ()>(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("u32"));
        assert!(msg.contains("String"));
    }

    #[test]
    fn test_file_write_message_has_path() {
        let err = PersistError::FileWrite {
            path: PathBuf::from("/tmp/run1.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("run1.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_journal_error_from_registry() {
        let err: JournalError = RegistryError::ChannelNotFound {
            name: "x".to_string(),
            scope: Scope::Instance,
        }
        .into();
        assert!(err.is_registry());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_journal_error_retryable() {
        let err: JournalError = PersistError::RemoteTimeout { duration_ms: 10 }.into();
        assert!(err.is_persist());
        assert!(err.is_retryable());

        let err: JournalError = ValidationError::EmptyField { field: "host" }.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());

        assert!(JournalError::CycleInProgress.is_retryable());
        assert!(!JournalError::internal("boom").is_retryable());
    }
}
