//! Best-effort sink for the external document store.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{info, warn};

use crate::document::Document;
use crate::error::PersistError;

use super::config::RemoteConfig;
use super::traits::{DocumentStore, RecordId};

/// What a remote save did.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// `enable` was false; no store call was made.
    Disabled,
    /// The document was empty; no store call was made.
    Skipped,
    /// One record was appended.
    Written {
        /// Id the store assigned.
        record: RecordId,
    },
    /// The write failed; the failure was downgraded to a warning.
    Failed(PersistError),
}

impl RemoteOutcome {
    /// True for [`RemoteOutcome::Written`].
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    /// True for [`RemoteOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Warning text for a failed write.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

/// Appends documents to an external store through a [`DocumentStore`].
///
/// Connect and insert run on a helper thread; the caller waits at most the
/// configured timeout (or the given deadline, whichever comes first). A
/// worker that misses it is detached and its result discarded.
///
/// At most one worker exists per sink (clones included). While a detached
/// worker is still stuck in the store, further saves fail immediately with a
/// warning instead of spawning another thread.
#[derive(Clone, Default)]
pub struct RemoteSink {
    store: Option<Arc<dyn DocumentStore>>,
    in_flight: Arc<AtomicBool>,
}

impl RemoteSink {
    /// Sink writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store: Some(store),
            in_flight: Arc::default(),
        }
    }

    /// A sink with no store client. Enabled saves fail with a warning.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Whether a store client is attached.
    #[must_use]
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// True while a worker, possibly a detached one, is still running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Append `document` as one new record. Never returns an error.
    pub fn save(&self, document: &Document, config: &RemoteConfig) -> RemoteOutcome {
        self.save_until(document, config, None)
    }

    /// [`save`](Self::save) bounded by an additional deadline.
    pub fn save_until(
        &self,
        document: &Document,
        config: &RemoteConfig,
        deadline: Option<Instant>,
    ) -> RemoteOutcome {
        if !config.enable {
            return RemoteOutcome::Disabled;
        }
        if document.is_empty() {
            return RemoteOutcome::Skipped;
        }

        let outcome = match (&self.store, config.clone().validate()) {
            (_, Err(invalid)) => RemoteOutcome::Failed(PersistError::InvalidRemoteConfig(invalid)),
            (Some(store), Ok(_)) => match self.write(Arc::clone(store), document, config, deadline) {
                Ok(record) => RemoteOutcome::Written { record },
                Err(err) => RemoteOutcome::Failed(err),
            },
            (None, Ok(_)) => RemoteOutcome::Failed(PersistError::RemoteConnect {
                target: config.redacted_uri(),
                message: "no document store client configured".to_string(),
            }),
        };

        match &outcome {
            RemoteOutcome::Written { record } => info!(
                uri = %config.redacted_uri(),
                database = %config.database,
                collection = %config.collection,
                record = %record,
                "journal record inserted"
            ),
            RemoteOutcome::Failed(err) => warn!(
                uri = %config.redacted_uri(),
                database = %config.database,
                collection = %config.collection,
                error = %err,
                "journal remote write failed; continuing without it"
            ),
            RemoteOutcome::Disabled | RemoteOutcome::Skipped => {}
        }
        outcome
    }

    fn write(
        &self,
        store: Arc<dyn DocumentStore>,
        document: &Document,
        config: &RemoteConfig,
        deadline: Option<Instant>,
    ) -> Result<RecordId, PersistError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(PersistError::RemoteConnect {
                target: config.redacted_uri(),
                message: "previous store write is still outstanding".to_string(),
            });
        }
        let busy = InFlight(Arc::clone(&self.in_flight));

        let wait = effective_wait(config.timeout(), deadline);
        let (reply_tx, reply_rx) = bounded::<Result<RecordId, PersistError>>(1);

        let worker_config = config.clone();
        let record = document.clone().into_value();
        thread::Builder::new()
            .name("telejournal-remote".to_string())
            .spawn(move || {
                let result = store.connect(&worker_config).and_then(|mut session| {
                    session.insert_one(&worker_config.database, &worker_config.collection, &record)
                });
                // Cleared before replying so the caller's next save sees it idle.
                drop(busy);
                // The receiver is gone if the caller already timed out.
                let _ = reply_tx.send(result);
            })
            .map_err(|e| PersistError::RemoteConnect {
                target: config.redacted_uri(),
                message: format!("failed to spawn store worker: {e}"),
            })?;

        reply_rx.recv_timeout(wait).map_err(|err| match err {
            RecvTimeoutError::Timeout => PersistError::RemoteTimeout {
                duration_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => PersistError::RemoteConnect {
                target: config.redacted_uri(),
                message: "store worker exited without a reply".to_string(),
            },
        })?
    }
}

/// Clears the sink's in-flight flag when the worker ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn effective_wait(timeout: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(d) => timeout.min(d.saturating_duration_since(Instant::now())),
        None => timeout,
    }
}

impl fmt::Debug for RemoteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSink")
            .field("has_store", &self.has_store())
            .finish()
    }
}
