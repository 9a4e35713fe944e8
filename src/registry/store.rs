//! The name-keyed channel registry.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::RegistryError;

use super::channel::{Channel, ChannelHandle, ChannelInfo, ErasedChannel, SubscriptionKey};
use super::invoke::InvokeOptions;
use super::signature::{Scope, Signature};
use super::watcher::{resolve_slot, SlotKind, Watcher};

fn lock_err(context: &'static str) -> RegistryError {
    RegistryError::LockPoisoned { context }
}

/// Name-keyed store of typed channels.
///
/// Each entry carries its [`Signature`]; typed access checks it before a
/// checked downcast, so a mismatched request fails with
/// [`RegistryError::TypeMismatch`] instead of yielding a wrongly typed channel.
///
/// Mutations (create, delete, connect, disconnect) hold the map's write lock.
/// Lookups and invokes hold the read lock only long enough to fetch the
/// channel; subscribers always run with no registry lock held.
pub struct EventRegistry {
    scope: Scope,
    channels: RwLock<BTreeMap<String, Arc<dyn ErasedChannel>>>,
}

impl EventRegistry {
    /// Create an empty registry for the given scope.
    #[must_use]
    pub const fn new(scope: Scope) -> Self {
        Self {
            scope,
            channels: RwLock::new(BTreeMap::new()),
        }
    }

    /// Scope this registry serves.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Create a channel with signature `fn(&A) -> R`.
    ///
    /// # Errors
    /// `DuplicateChannel` if the name is already taken in this registry.
    pub fn create_channel<A: 'static, R: 'static>(
        &self,
        name: impl Into<String>,
    ) -> Result<ChannelHandle<A, R>, RegistryError> {
        let name = name.into();
        let mut channels = self.channels.write().map_err(|_| lock_err("registry.channels"))?;
        if channels.contains_key(&name) {
            return Err(RegistryError::DuplicateChannel {
                name,
                scope: self.scope,
            });
        }

        let channel = Arc::new(Channel::<A, R>::new(name.clone(), self.scope));
        let erased: Arc<dyn ErasedChannel> = Arc::clone(&channel) as Arc<dyn ErasedChannel>;
        channels.insert(name.clone(), erased);

        let signature = Signature::of::<A, R>();
        debug!(channel = %name, scope = %self.scope, %signature, "channel created");
        Ok(ChannelHandle { inner: channel })
    }

    /// Remove a channel and drop its subscriptions. Returns whether it existed.
    pub fn delete_channel(&self, name: &str) -> Result<bool, RegistryError> {
        let removed = self
            .channels
            .write()
            .map_err(|_| lock_err("registry.channels"))?
            .remove(name);
        match removed {
            Some(channel) => {
                channel.clear()?;
                debug!(channel = %name, scope = %self.scope, "channel deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetch a typed handle.
    ///
    /// # Errors
    /// `ChannelNotFound` if absent, `TypeMismatch` if the stored signature is
    /// not `fn(&A) -> R`.
    pub fn lookup_channel<A: 'static, R: 'static>(
        &self,
        name: &str,
    ) -> Result<ChannelHandle<A, R>, RegistryError> {
        let channels = self.channels.read().map_err(|_| lock_err("registry.channels"))?;
        typed_entry(&channels, name, self.scope)
    }

    /// Untyped description of one channel.
    pub fn channel_info(&self, name: &str) -> Result<ChannelInfo, RegistryError> {
        let channels = self.channels.read().map_err(|_| lock_err("registry.channels"))?;
        let entry = channels.get(name).ok_or_else(|| RegistryError::ChannelNotFound {
            name: name.to_string(),
            scope: self.scope,
        })?;
        info_of(entry.as_ref())
    }

    /// Attach `watcher`'s slot `slot` to the channel.
    ///
    /// Returns `false` if that (watcher, slot, kind) is already connected.
    ///
    /// # Errors
    /// `ChannelNotFound`, `SlotNotFound`, or `TypeMismatch` when either the
    /// channel or the slot has a different signature.
    pub fn connect<A: 'static, R: 'static>(
        &self,
        channel: &str,
        watcher: &dyn Watcher,
        slot: &str,
        kind: SlotKind,
    ) -> Result<bool, RegistryError> {
        let channels = self.channels.write().map_err(|_| lock_err("registry.channels"))?;
        let handle: ChannelHandle<A, R> = typed_entry(&channels, channel, self.scope)?;
        let callable = resolve_slot::<A, R>(watcher, slot, kind)?;

        let key = SubscriptionKey::new(watcher.watcher_id(), slot, kind);
        let added = handle.inner.connect(key, callable)?;
        if added {
            debug!(
                channel = %channel,
                scope = %self.scope,
                watcher = %watcher.watcher_id(),
                label = watcher.label(),
                slot = %slot,
                kind = %kind,
                "slot connected"
            );
        } else {
            debug!(channel = %channel, slot = %slot, kind = %kind, "slot already connected");
        }
        Ok(added)
    }

    /// Detach exactly the matching subscription, for either slot kind.
    ///
    /// A missing channel or subscription is a no-op returning `false`.
    pub fn disconnect(
        &self,
        channel: &str,
        watcher: &dyn Watcher,
        slot: &str,
        kind: SlotKind,
    ) -> Result<bool, RegistryError> {
        let channels = self.channels.write().map_err(|_| lock_err("registry.channels"))?;
        let Some(entry) = channels.get(channel) else {
            return Ok(false);
        };
        let key = SubscriptionKey::new(watcher.watcher_id(), slot, kind);
        let removed = entry.disconnect(&key)?;
        if removed {
            debug!(channel = %channel, scope = %self.scope, subscription = %key, "slot disconnected");
        }
        Ok(removed)
    }

    /// Call every subscriber in registration order and return all results.
    pub fn invoke<A: 'static, R: 'static>(&self, channel: &str, args: &A) -> Result<Vec<R>, RegistryError> {
        self.invoke_with(channel, args, &InvokeOptions::default())
    }

    /// [`invoke`](Self::invoke) with a deadline and/or cancellation token.
    ///
    /// Before each subscriber the channel is re-validated; if it was deleted
    /// meanwhile the remaining calls are skipped with a warning and the results
    /// gathered so far are returned.
    ///
    /// # Errors
    /// Lookup errors as for [`lookup_channel`](Self::lookup_channel), plus
    /// `DeadlineExceeded` and `Cancelled`.
    pub fn invoke_with<A: 'static, R: 'static>(
        &self,
        channel: &str,
        args: &A,
        options: &InvokeOptions,
    ) -> Result<Vec<R>, RegistryError> {
        let handle = self.lookup_channel::<A, R>(channel)?;
        let subscribers = handle.inner.snapshot()?;
        let total = subscribers.len();

        let mut results = Vec::with_capacity(total);
        for (completed, sub) in subscribers.iter().enumerate() {
            if options.is_cancelled() {
                return Err(RegistryError::Cancelled {
                    channel: channel.to_string(),
                    completed,
                });
            }
            if options.is_expired() {
                return Err(RegistryError::DeadlineExceeded {
                    channel: channel.to_string(),
                    completed,
                    total,
                });
            }
            if !self.is_registered(channel, &handle)? {
                warn!(
                    channel = %channel,
                    scope = %self.scope,
                    completed,
                    total,
                    "channel deleted during invoke; remaining subscribers skipped"
                );
                break;
            }
            results.push((sub.callable)(args));
        }
        Ok(results)
    }

    /// Sorted snapshot of channel names.
    pub fn list_channels(&self) -> Result<Vec<String>, RegistryError> {
        let channels = self.channels.read().map_err(|_| lock_err("registry.channels"))?;
        Ok(channels.keys().cloned().collect())
    }

    /// Descriptions of every channel, sorted by name.
    pub fn channel_infos(&self) -> Result<Vec<ChannelInfo>, RegistryError> {
        let channels = self.channels.read().map_err(|_| lock_err("registry.channels"))?;
        channels.values().map(|c| info_of(c.as_ref())).collect()
    }

    /// Human-readable listing, one channel per line.
    pub fn describe(&self) -> Result<String, RegistryError> {
        let infos = self.channel_infos()?;
        let mut out = format!("{} channels ({}):\n", self.scope, infos.len());
        for info in &infos {
            let _ = writeln!(out, "* {info}");
        }
        Ok(out)
    }

    /// Number of channels (0 if the lock is poisoned).
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.read().map(|c| c.len()).unwrap_or(0)
    }

    /// True when the registry has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every channel and subscription.
    pub fn clear(&self) -> Result<(), RegistryError> {
        let drained = std::mem::take(
            &mut *self.channels.write().map_err(|_| lock_err("registry.channels"))?,
        );
        for channel in drained.values() {
            channel.clear()?;
        }
        debug!(scope = %self.scope, channels = drained.len(), "registry cleared");
        Ok(())
    }

    fn is_registered<A: 'static, R: 'static>(
        &self,
        name: &str,
        handle: &ChannelHandle<A, R>,
    ) -> Result<bool, RegistryError> {
        let channels = self.channels.read().map_err(|_| lock_err("registry.channels"))?;
        Ok(channels.get(name).is_some_and(|entry| {
            Arc::as_ptr(entry).cast::<()>() == Arc::as_ptr(&handle.inner).cast::<()>()
        }))
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("scope", &self.scope)
            .field("channels", &self.list_channels().unwrap_or_default())
            .finish()
    }
}

fn typed_entry<A: 'static, R: 'static>(
    channels: &BTreeMap<String, Arc<dyn ErasedChannel>>,
    name: &str,
    scope: Scope,
) -> Result<ChannelHandle<A, R>, RegistryError> {
    let entry = channels.get(name).ok_or_else(|| RegistryError::ChannelNotFound {
        name: name.to_string(),
        scope,
    })?;

    let expected = Signature::of::<A, R>();
    let found = entry.signature();
    let mismatch = || RegistryError::TypeMismatch {
        name: name.to_string(),
        expected,
        found,
    };
    if found != expected {
        return Err(mismatch());
    }

    let inner = Arc::clone(entry)
        .into_any()
        .downcast::<Channel<A, R>>()
        .map_err(|_| mismatch())?;
    Ok(ChannelHandle { inner })
}

fn info_of(channel: &dyn ErasedChannel) -> Result<ChannelInfo, RegistryError> {
    Ok(ChannelInfo {
        name: channel.name().to_string(),
        scope: channel.scope(),
        signature: channel.signature(),
        subscribers: channel.subscribers()?.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SlotTable, WatcherId};

    struct Counter {
        id: WatcherId,
        slots: SlotTable,
        statics: SlotTable,
    }

    impl Counter {
        fn new(value: u32) -> Self {
            Self {
                id: WatcherId::new(),
                slots: SlotTable::new()
                    .with("value", move |(): &()| value)
                    .with("add", move |x: &u32| x + value),
                statics: SlotTable::new().with("kind", |(): &()| 1000u32),
            }
        }
    }

    impl Watcher for Counter {
        fn watcher_id(&self) -> WatcherId {
            self.id
        }

        fn slots(&self) -> &SlotTable {
            &self.slots
        }

        fn static_slots(&self) -> Option<&SlotTable> {
            Some(&self.statics)
        }
    }

    #[test]
    fn test_create_then_lookup_same_signature() {
        let reg = EventRegistry::new(Scope::Instance);
        let created = reg.create_channel::<(), u32>("values").unwrap();
        let found = reg.lookup_channel::<(), u32>("values").unwrap();
        assert_eq!(created.signature(), found.signature());
        assert_eq!(found.name(), "values");
        assert_eq!(found.scope(), Scope::Instance);
    }

    #[test]
    fn test_create_duplicate_fails() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        let err = reg.create_channel::<(), u32>("values").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateChannel { .. }));

        // A different signature does not make the name available either.
        let err = reg.create_channel::<u8, u8>("values").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateChannel { .. }));
    }

    #[test]
    fn test_lookup_mismatch_and_missing() {
        let reg = EventRegistry::new(Scope::Process);
        reg.create_channel::<(), u32>("values").unwrap();

        let err = reg.lookup_channel::<(), u64>("values").unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));

        let err = reg.lookup_channel::<(), u32>("nope").unwrap_err();
        assert!(matches!(err, RegistryError::ChannelNotFound { .. }));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        assert!(reg.delete_channel("values").unwrap());
        assert!(!reg.delete_channel("values").unwrap());
        assert!(reg.is_empty());
        reg.create_channel::<(), u32>("values").unwrap();
    }

    #[test]
    fn test_invoke_returns_all_results_in_order() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        let watchers: Vec<Counter> = (1..=4).map(Counter::new).collect();
        for w in &watchers {
            assert!(reg.connect::<(), u32>("values", w, "value", SlotKind::Instance).unwrap());
        }
        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_invoke_passes_arguments() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<u32, u32>("add").unwrap();
        let w = Counter::new(5);
        reg.connect::<u32, u32>("add", &w, "add", SlotKind::Instance).unwrap();
        assert_eq!(reg.invoke::<u32, u32>("add", &10).unwrap(), vec![15]);
    }

    #[test]
    fn test_invoke_empty_channel() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        assert!(reg.invoke::<(), u32>("values", &()).unwrap().is_empty());
    }

    #[test]
    fn test_connect_twice_is_noop() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        let w = Counter::new(7);
        assert!(reg.connect::<(), u32>("values", &w, "value", SlotKind::Instance).unwrap());
        assert!(!reg.connect::<(), u32>("values", &w, "value", SlotKind::Instance).unwrap());
        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![7]);
    }

    #[test]
    fn test_connect_errors() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        let w = Counter::new(1);

        let err = reg.connect::<(), u32>("missing", &w, "value", SlotKind::Instance).unwrap_err();
        assert!(matches!(err, RegistryError::ChannelNotFound { .. }));

        let err = reg.connect::<(), u32>("values", &w, "nope", SlotKind::Instance).unwrap_err();
        assert!(matches!(err, RegistryError::SlotNotFound { .. }));

        // Channel signature differs from the requested one.
        let err = reg.connect::<u32, u32>("values", &w, "add", SlotKind::Instance).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));

        // Slot exists but with another signature.
        let err = reg.connect::<(), u32>("values", &w, "add", SlotKind::Instance).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_disconnect_instance_and_static() {
        let reg = EventRegistry::new(Scope::Instance);
        reg.create_channel::<(), u32>("values").unwrap();
        let a = Counter::new(1);
        let b = Counter::new(2);
        reg.connect::<(), u32>("values", &a, "value", SlotKind::Instance).unwrap();
        reg.connect::<(), u32>("values", &b, "kind", SlotKind::Static).unwrap();
        reg.connect::<(), u32>("values", &b, "value", SlotKind::Instance).unwrap();
        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![1, 1000, 2]);

        assert!(reg.disconnect("values", &b, "kind", SlotKind::Static).unwrap());
        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![1, 2]);

        assert!(reg.disconnect("values", &a, "value", SlotKind::Instance).unwrap());
        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![2]);

        assert!(!reg.disconnect("values", &a, "value", SlotKind::Instance).unwrap());
        assert!(!reg.disconnect("missing", &a, "value", SlotKind::Instance).unwrap());
    }

    #[test]
    fn test_channel_deleted_mid_invoke_truncates() {
        let reg = Arc::new(EventRegistry::new(Scope::Instance));
        reg.create_channel::<(), u32>("values").unwrap();

        struct Deleter {
            id: WatcherId,
            slots: SlotTable,
        }
        impl Watcher for Deleter {
            fn watcher_id(&self) -> WatcherId {
                self.id
            }
            fn slots(&self) -> &SlotTable {
                &self.slots
            }
        }

        let first = Counter::new(1);
        let weak = Arc::downgrade(&reg);
        let deleter = Deleter {
            id: WatcherId::new(),
            slots: SlotTable::new().with("value", move |(): &()| {
                if let Some(reg) = weak.upgrade() {
                    reg.delete_channel("values").unwrap();
                }
                2u32
            }),
        };
        let last = Counter::new(3);

        reg.connect::<(), u32>("values", &first, "value", SlotKind::Instance).unwrap();
        reg.connect::<(), u32>("values", &deleter, "value", SlotKind::Instance).unwrap();
        reg.connect::<(), u32>("values", &last, "value", SlotKind::Instance).unwrap();

        assert_eq!(reg.invoke::<(), u32>("values", &()).unwrap(), vec![1, 2]);
        assert!(reg.list_channels().unwrap().is_empty());
    }

    #[test]
    fn test_list_and_describe() {
        let reg = EventRegistry::new(Scope::Process);
        reg.create_channel::<(), u32>("b").unwrap();
        reg.create_channel::<(), u32>("a").unwrap();
        assert_eq!(reg.list_channels().unwrap(), vec!["a".to_string(), "b".to_string()]);

        let text = reg.describe().unwrap();
        assert!(text.starts_with("process channels (2)"));
        assert!(text.contains("* a [process]"));

        let info = reg.channel_info("a").unwrap();
        assert_eq!(info.subscribers, 0);
        assert_eq!(info.signature, Signature::of::<(), u32>());
    }

    #[test]
    fn test_clear_removes_everything() {
        let reg = EventRegistry::new(Scope::Process);
        reg.create_channel::<(), u32>("a").unwrap();
        reg.create_channel::<(), u32>("b").unwrap();
        reg.clear().unwrap();
        assert_eq!(reg.len(), 0);
    }
}
