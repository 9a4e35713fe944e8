//! The collect → merge → persist cycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{JournalError, JournalResult, RegistryError};
use crate::registry::{EventHub, EventRegistry, InvokeOptions, Scope, SlotKind, Watcher};
use crate::storage::{
    DocumentStore, FileSink, JournalConfig, RemoteConfig, RemoteOutcome, RemoteSink,
};

use super::document::{CaptureTime, JournalDocument, SchemaMetadata};
use super::{COLLECT_CHANNEL, NOTIFY_SLOT};

/// Phase of the aggregator's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// No cycle running.
    #[default]
    Idle,
    /// Subscribers are being invoked.
    Collecting,
    /// A merged document is ready to save.
    Merged,
    /// The last merged document was saved.
    Persisted,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Merged => "merged",
            Self::Persisted => "persisted",
        };
        f.write_str(s)
    }
}

/// Result of [`JournalAggregator::save`].
#[derive(Debug)]
pub struct SaveReport {
    /// Path written, or `None` when nothing was written.
    pub file: Option<PathBuf>,
    /// What the remote sink did.
    pub remote: RemoteOutcome,
}

impl SaveReport {
    fn skipped() -> Self {
        Self {
            file: None,
            remote: RemoteOutcome::Skipped,
        }
    }

    /// True when the save found nothing to write.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.file.is_none() && matches!(self.remote, RemoteOutcome::Skipped)
    }
}

/// Builder for [`JournalAggregator`].
#[derive(Default)]
pub struct JournalAggregatorBuilder {
    hub: Option<Arc<EventHub>>,
    config: Option<JournalConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    file_sink: Option<FileSink>,
    remote_sink: Option<RemoteSink>,
}

impl JournalAggregatorBuilder {
    /// Builder with every option unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing hub instead of a fresh one on the global registry.
    #[must_use]
    pub fn hub(mut self, hub: Arc<EventHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Use a fresh hub sharing `registry` as its process scope.
    #[must_use]
    pub fn process_registry(mut self, registry: Arc<EventRegistry>) -> Self {
        self.hub = Some(Arc::new(EventHub::with_process_registry(registry)));
        self
    }

    /// Initial configuration; validated by `build`.
    #[must_use]
    pub fn config(mut self, config: JournalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Store client for remote saves. Ignored if a remote sink is given.
    #[must_use]
    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default file sink.
    #[must_use]
    pub fn file_sink(mut self, sink: FileSink) -> Self {
        self.file_sink = Some(sink);
        self
    }

    /// Replace the remote sink built from `document_store`.
    #[must_use]
    pub fn remote_sink(mut self, sink: RemoteSink) -> Self {
        self.remote_sink = Some(sink);
        self
    }

    /// Validate the configuration and attach to the collect channel,
    /// creating it if this is the first aggregator on the process registry.
    ///
    /// # Errors
    /// `Validation` for a bad config; `Registry(TypeMismatch)` if a channel
    /// named `journal.collect` exists with another signature.
    pub fn build(self) -> JournalResult<JournalAggregator> {
        let config = self.config.unwrap_or_default().validate()?;
        let hub = match self.hub {
            Some(hub) => hub,
            None => Arc::new(EventHub::new()),
        };
        ensure_collect_channel(&hub)?;

        let remote_sink = match (self.remote_sink, self.store) {
            (Some(sink), _) => sink,
            (None, Some(store)) => RemoteSink::new(store),
            (None, None) => RemoteSink::unconfigured(),
        };

        Ok(JournalAggregator {
            hub,
            config: RwLock::new(config),
            file_sink: self.file_sink.unwrap_or_default(),
            remote_sink,
            state: Mutex::new(CycleState::Idle),
            last: RwLock::new(None),
        })
    }
}

fn ensure_collect_channel(hub: &EventHub) -> Result<(), RegistryError> {
    match hub.lookup_channel::<(), Document>(COLLECT_CHANNEL, Scope::Process) {
        Ok(_) => Ok(()),
        Err(RegistryError::ChannelNotFound { .. }) => {
            match hub.create_channel::<(), Document>(COLLECT_CHANNEL, Scope::Process) {
                Ok(_) => {
                    debug!(channel = COLLECT_CHANNEL, "journal collect channel created");
                    Ok(())
                }
                // Another aggregator won the race.
                Err(RegistryError::DuplicateChannel { .. }) => hub
                    .lookup_channel::<(), Document>(COLLECT_CHANNEL, Scope::Process)
                    .map(|_| ()),
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

/// Collects fragments from every registered watcher and persists the merged
/// journal.
///
/// ```
/// use std::sync::Arc;
/// use telejournal::{Document, EventRegistry, JournalAggregator, JournalWatcher, Scope};
///
/// let registry = Arc::new(EventRegistry::new(Scope::Process));
/// let journal = JournalAggregator::builder().process_registry(registry).build()?;
///
/// let mesh = JournalWatcher::new("mesh", || {
///     let mut doc = Document::new();
///     doc.put("mesh.n", 100);
///     doc
/// });
/// journal.register_watcher(&mesh)?;
///
/// let merged = journal.collect()?;
/// assert_eq!(merged.body().get("mesh.n"), Some(&serde_json::json!(100)));
/// # Ok::<(), telejournal::JournalError>(())
/// ```
pub struct JournalAggregator {
    hub: Arc<EventHub>,
    config: RwLock<JournalConfig>,
    file_sink: FileSink,
    remote_sink: RemoteSink,
    state: Mutex<CycleState>,
    last: RwLock<Option<JournalDocument>>,
}

impl JournalAggregator {
    /// Start configuring an aggregator.
    #[must_use]
    pub fn builder() -> JournalAggregatorBuilder {
        JournalAggregatorBuilder::new()
    }

    /// Aggregator with default config on the global process registry.
    pub fn new() -> JournalResult<Self> {
        Self::builder().build()
    }

    /// Hub this aggregator routes through.
    #[must_use]
    pub const fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Current cycle phase.
    #[must_use]
    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `watcher`'s instance `journal.notify` slot.
    ///
    /// Returns `false` if it was already attached.
    pub fn register_watcher(&self, watcher: &dyn Watcher) -> JournalResult<bool> {
        self.register_watcher_with(watcher, SlotKind::Instance)
    }

    /// Attach `watcher`'s `journal.notify` slot of the given kind.
    pub fn register_watcher_with(&self, watcher: &dyn Watcher, kind: SlotKind) -> JournalResult<bool> {
        let added = self.hub.connect::<(), Document>(
            COLLECT_CHANNEL,
            watcher,
            NOTIFY_SLOT,
            kind,
            Scope::Process,
        )?;
        Ok(added)
    }

    /// Detach `watcher`'s instance slot. `false` if it was not attached.
    pub fn unregister_watcher(&self, watcher: &dyn Watcher) -> JournalResult<bool> {
        self.unregister_watcher_with(watcher, SlotKind::Instance)
    }

    /// Detach `watcher`'s slot of the given kind.
    pub fn unregister_watcher_with(&self, watcher: &dyn Watcher, kind: SlotKind) -> JournalResult<bool> {
        let removed = self
            .hub
            .disconnect(COLLECT_CHANNEL, watcher, NOTIFY_SLOT, kind, Scope::Process)?;
        Ok(removed)
    }

    /// Number of subscriptions on the collect channel.
    pub fn watcher_count(&self) -> JournalResult<usize> {
        let info = self.hub.channel_info(COLLECT_CHANNEL, Scope::Process)?;
        Ok(info.subscribers)
    }

    /// Run one collection cycle and return the freshly merged document.
    pub fn collect(&self) -> JournalResult<JournalDocument> {
        self.collect_with(&InvokeOptions::default())
    }

    /// [`collect`](Self::collect) with a deadline and/or cancellation token.
    ///
    /// # Errors
    /// `CycleInProgress` if another cycle is running; registry errors from the
    /// invoke. On error the previous document is kept and the state returns
    /// to `Idle`.
    pub fn collect_with(&self, options: &InvokeOptions) -> JournalResult<JournalDocument> {
        let mut cycle = CycleGuard::begin(&self.state)?;
        let captured = CaptureTime::now();

        let fragments = self.hub.invoke_with::<(), Document>(
            COLLECT_CHANNEL,
            &(),
            Scope::Process,
            options,
        )?;

        let journal = JournalDocument::assemble(SchemaMetadata::current(captured), fragments);
        debug!(
            contributors = journal.contributors(),
            keys = journal.document().len(),
            epoch = journal.metadata().time.epoch,
            "journal cycle merged"
        );

        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(journal.clone());
        cycle.finish(CycleState::Merged);
        Ok(journal)
    }

    /// The document merged by the last successful cycle.
    #[must_use]
    pub fn document(&self) -> Option<JournalDocument> {
        self.last.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Persist the last merged document: file first, then the remote store.
    ///
    /// `path` defaults to the configured file stem; `.json` is appended. With
    /// no merged document, or one whose fragments were all empty, nothing is
    /// written and no store call is made.
    ///
    /// # Errors
    /// `CycleInProgress` during a collection, `Persist(FileWrite)` or
    /// `Persist(Serialization)` from the file sink. Remote failures are
    /// reported in [`SaveReport::remote`], never as an error.
    pub fn save(&self, path: Option<&Path>) -> JournalResult<SaveReport> {
        let mut cycle = CycleGuard::enter(&self.state, CycleState::Persisted)?;

        let Some(journal) = self.document().filter(|j| !j.is_empty()) else {
            debug!("journal save skipped: nothing collected");
            cycle.finish(CycleState::Idle);
            return Ok(SaveReport::skipped());
        };

        let config = self.config();
        let target = path.map_or_else(|| PathBuf::from(&config.file_stem), Path::to_path_buf);

        // Leave the cycle in `Merged` if the file write fails so it can be retried.
        cycle.finish(CycleState::Merged);
        let file = self.file_sink.save(journal.document(), &target)?;
        let remote = self.remote_sink.save(journal.document(), &config.remote);
        cycle.finish(CycleState::Idle);

        info!(
            path = ?file.as_ref().map(|p| p.display().to_string()),
            contributors = journal.contributors(),
            remote_written = remote.is_written(),
            "journal saved"
        );
        Ok(SaveReport { file, remote })
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> JournalConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply `f` to a copy of the config and keep it only if it validates.
    fn update_config(&self, f: impl FnOnce(&mut JournalConfig)) -> JournalResult<()> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        f(&mut candidate);
        *config = candidate.validate()?;
        Ok(())
    }

    fn update_remote(&self, f: impl FnOnce(&mut RemoteConfig)) -> JournalResult<()> {
        self.update_config(|c| f(&mut c.remote))
    }

    /// Default output path used by `save(None)`.
    pub fn set_file_stem(&self, stem: impl Into<String>) -> JournalResult<()> {
        let stem = stem.into();
        self.update_config(|c| c.file_stem = stem)
    }

    /// Turn remote writes on or off. Enabling checks the endpoint fields.
    pub fn set_remote_enabled(&self, enable: bool) -> JournalResult<()> {
        self.update_remote(|r| r.enable = enable)
    }

    /// Store host name.
    pub fn set_db_host(&self, host: impl Into<String>) -> JournalResult<()> {
        let host = host.into();
        self.update_remote(|r| r.host = host)
    }

    /// Store port; 0 is rejected while remote writes are enabled.
    pub fn set_db_port(&self, port: u16) -> JournalResult<()> {
        self.update_remote(|r| r.port = port)
    }

    /// Store user name.
    pub fn set_db_user(&self, user: impl Into<String>) -> JournalResult<()> {
        let user = user.into();
        self.update_remote(|r| r.user = user)
    }

    /// Store password.
    pub fn set_db_password(&self, password: impl Into<String>) -> JournalResult<()> {
        let password = password.into();
        self.update_remote(|r| r.password = password)
    }

    /// Database the user authenticates against.
    pub fn set_db_auth_source(&self, auth_source: impl Into<String>) -> JournalResult<()> {
        let auth_source = auth_source.into();
        self.update_remote(|r| r.auth_source = auth_source)
    }

    /// Database records are inserted into.
    pub fn set_db_name(&self, database: impl Into<String>) -> JournalResult<()> {
        let database = database.into();
        self.update_remote(|r| r.database = database)
    }

    /// Collection records are inserted into.
    pub fn set_db_collection(&self, collection: impl Into<String>) -> JournalResult<()> {
        let collection = collection.into();
        self.update_remote(|r| r.collection = collection)
    }

    /// Replace the whole remote section after validating it.
    pub fn set_remote_config(&self, remote: RemoteConfig) -> JournalResult<()> {
        self.update_config(|c| c.remote = remote)
    }
}

impl fmt::Debug for JournalAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalAggregator")
            .field("state", &self.state())
            .field("config", &self.config())
            .field("remote_sink", &self.remote_sink)
            .finish_non_exhaustive()
    }
}

/// Holds the cycle state for one operation and writes the exit state on drop,
/// `Idle` unless [`finish`](Self::finish) chose another.
struct CycleGuard<'a> {
    state: &'a Mutex<CycleState>,
    exit: CycleState,
}

impl<'a> CycleGuard<'a> {
    /// Enter `Collecting`; only one cycle may collect at a time.
    fn begin(state: &'a Mutex<CycleState>) -> JournalResult<Self> {
        Self::enter(state, CycleState::Collecting)
    }

    fn enter(state: &'a Mutex<CycleState>, next: CycleState) -> JournalResult<Self> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*current, CycleState::Collecting | CycleState::Persisted) {
            return Err(JournalError::CycleInProgress);
        }
        *current = next;
        Ok(Self {
            state,
            exit: CycleState::Idle,
        })
    }

    fn finish(&mut self, exit: CycleState) {
        self.exit = exit;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.exit;
    }
}
