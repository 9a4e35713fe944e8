//! Lifecycle of the process-wide registry.
//!
//! The shared registry is an explicit object rather than hidden static state:
//! [`init`] creates it (idempotently), [`process_registry`] fetches it and
//! initializes on first use, and [`shutdown`] releases it. Components receive
//! the `Arc` by injection, so tests can build isolated registries with
//! [`EventRegistry::new`] and never touch this one.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::signature::Scope;
use super::store::EventRegistry;

static PROCESS_REGISTRY: RwLock<Option<Arc<EventRegistry>>> = RwLock::new(None);

/// Create the process-wide registry if needed and return it.
pub fn init() -> Arc<EventRegistry> {
    let mut slot = PROCESS_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(registry) = slot.as_ref() {
        return Arc::clone(registry);
    }
    let registry = Arc::new(EventRegistry::new(Scope::Process));
    *slot = Some(Arc::clone(&registry));
    debug!("process registry initialized");
    registry
}

/// The process-wide registry, initialized on first use.
pub fn process_registry() -> Arc<EventRegistry> {
    let current = PROCESS_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(Arc::clone);
    current.unwrap_or_else(init)
}

/// Whether [`init`] has run since the last [`shutdown`].
#[must_use]
pub fn is_initialized() -> bool {
    PROCESS_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Release the process-wide registry.
///
/// Every channel and subscription in it is dropped, including through `Arc`s
/// still held by hubs. Returns `false` if nothing was initialized.
pub fn shutdown() -> bool {
    let taken = PROCESS_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match taken {
        Some(registry) => {
            if let Err(err) = registry.clear() {
                debug!(error = %err, "process registry cleared with errors");
            }
            debug!("process registry shut down");
            true
        }
        None => false,
    }
}
