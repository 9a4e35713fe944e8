//! Scope-routing front end over the instance and process registries.

use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;

use super::channel::{ChannelHandle, ChannelInfo};
use super::global;
use super::invoke::InvokeOptions;
use super::signature::Scope;
use super::store::EventRegistry;
use super::watcher::{SlotKind, Watcher};

/// A handler object owning one instance-scope registry and sharing the
/// process-wide one.
///
/// Every operation takes a [`Scope`] and is routed to the matching registry.
pub struct EventHub {
    local: EventRegistry,
    process: Arc<EventRegistry>,
}

impl EventHub {
    /// Hub backed by the global process registry (see [`global::init`]).
    #[must_use]
    pub fn new() -> Self {
        Self::with_process_registry(global::process_registry())
    }

    /// Hub sharing an explicitly provided process-scope registry.
    #[must_use]
    pub fn with_process_registry(process: Arc<EventRegistry>) -> Self {
        Self {
            local: EventRegistry::new(Scope::Instance),
            process,
        }
    }

    /// The registry serving `scope`.
    #[must_use]
    pub fn registry(&self, scope: Scope) -> &EventRegistry {
        match scope {
            Scope::Instance => &self.local,
            Scope::Process => self.process.as_ref(),
        }
    }

    /// The shared process-scope registry.
    #[must_use]
    pub fn process_registry(&self) -> &Arc<EventRegistry> {
        &self.process
    }

    /// Create a typed channel in `scope`.
    pub fn create_channel<A: 'static, R: 'static>(
        &self,
        name: impl Into<String>,
        scope: Scope,
    ) -> Result<ChannelHandle<A, R>, RegistryError> {
        self.registry(scope).create_channel(name)
    }

    /// Delete a channel from `scope`; `false` if it did not exist.
    pub fn delete_channel(&self, name: &str, scope: Scope) -> Result<bool, RegistryError> {
        self.registry(scope).delete_channel(name)
    }

    /// Typed handle to an existing channel in `scope`.
    pub fn lookup_channel<A: 'static, R: 'static>(
        &self,
        name: &str,
        scope: Scope,
    ) -> Result<ChannelHandle<A, R>, RegistryError> {
        self.registry(scope).lookup_channel(name)
    }

    /// Untyped description of a channel in `scope`.
    pub fn channel_info(&self, name: &str, scope: Scope) -> Result<ChannelInfo, RegistryError> {
        self.registry(scope).channel_info(name)
    }

    /// Subscribe `watcher`'s `slot` to a channel in `scope`.
    pub fn connect<A: 'static, R: 'static>(
        &self,
        channel: &str,
        watcher: &dyn Watcher,
        slot: &str,
        kind: SlotKind,
        scope: Scope,
    ) -> Result<bool, RegistryError> {
        self.registry(scope).connect::<A, R>(channel, watcher, slot, kind)
    }

    /// Remove a subscription from a channel in `scope`.
    pub fn disconnect(
        &self,
        channel: &str,
        watcher: &dyn Watcher,
        slot: &str,
        kind: SlotKind,
        scope: Scope,
    ) -> Result<bool, RegistryError> {
        self.registry(scope).disconnect(channel, watcher, slot, kind)
    }

    /// Call every subscriber of a channel in `scope`, in registration order.
    pub fn invoke<A: 'static, R: 'static>(
        &self,
        channel: &str,
        args: &A,
        scope: Scope,
    ) -> Result<Vec<R>, RegistryError> {
        self.registry(scope).invoke(channel, args)
    }

    /// [`invoke`](Self::invoke) with a deadline and cancellation.
    pub fn invoke_with<A: 'static, R: 'static>(
        &self,
        channel: &str,
        args: &A,
        scope: Scope,
        options: &InvokeOptions,
    ) -> Result<Vec<R>, RegistryError> {
        self.registry(scope).invoke_with(channel, args, options)
    }

    /// Channel names in `scope`, sorted.
    pub fn list_channels(&self, scope: Scope) -> Result<Vec<String>, RegistryError> {
        self.registry(scope).list_channels()
    }

    /// Human-readable dump of `scope`'s channels.
    pub fn describe(&self, scope: Scope) -> Result<String, RegistryError> {
        self.registry(scope).describe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("local", &self.local)
            .field("process", &self.process)
            .finish()
    }
}
