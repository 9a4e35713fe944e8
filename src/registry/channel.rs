//! Typed channels and their subscription lists.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

use super::signature::{Scope, Signature};
use super::watcher::{SlotFn, SlotKind, WatcherId};

fn lock_err(context: &'static str) -> RegistryError {
    RegistryError::LockPoisoned { context }
}

/// Identity of one subscription on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// Subscribed watcher.
    pub watcher: WatcherId,
    /// Slot name on the watcher.
    pub slot: String,
    /// Which slot table the slot comes from.
    pub kind: SlotKind,
}

impl SubscriptionKey {
    /// Key for one watcher slot.
    #[must_use]
    pub fn new(watcher: WatcherId, slot: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            watcher,
            slot: slot.into(),
            kind,
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} ({})", self.watcher, self.slot, self.kind)
    }
}

pub(crate) struct Subscription<A, R> {
    pub(crate) key: SubscriptionKey,
    pub(crate) callable: Arc<SlotFn<A, R>>,
}

impl<A, R> Clone for Subscription<A, R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            callable: Arc::clone(&self.callable),
        }
    }
}

/// A named channel with a fixed signature and ordered subscribers.
pub struct Channel<A, R> {
    name: String,
    scope: Scope,
    subscriptions: RwLock<Vec<Subscription<A, R>>>,
}

impl<A: 'static, R: 'static> Channel<A, R> {
    pub(crate) fn new(name: String, scope: Scope) -> Self {
        Self {
            name,
            scope,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Append a subscription. Returns `false` when the key is already connected.
    pub(crate) fn connect(
        &self,
        key: SubscriptionKey,
        callable: Arc<SlotFn<A, R>>,
    ) -> Result<bool, RegistryError> {
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| lock_err("channel.subscriptions"))?;
        if subs.iter().any(|s| s.key == key) {
            return Ok(false);
        }
        subs.push(Subscription { key, callable });
        Ok(true)
    }

    /// Copy of the subscription list in registration order.
    pub(crate) fn snapshot(&self) -> Result<Vec<Subscription<A, R>>, RegistryError> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| lock_err("channel.subscriptions"))?;
        Ok(subs.clone())
    }
}

/// Signature-independent view of a channel, used by the registry map.
pub(crate) trait ErasedChannel: Send + Sync {
    fn name(&self) -> &str;
    fn scope(&self) -> Scope;
    fn signature(&self) -> Signature;
    fn subscribers(&self) -> Result<Vec<SubscriptionKey>, RegistryError>;
    fn disconnect(&self, key: &SubscriptionKey) -> Result<bool, RegistryError>;
    fn clear(&self) -> Result<(), RegistryError>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<A: 'static, R: 'static> ErasedChannel for Channel<A, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    fn signature(&self) -> Signature {
        Signature::of::<A, R>()
    }

    fn subscribers(&self) -> Result<Vec<SubscriptionKey>, RegistryError> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| lock_err("channel.subscriptions"))?;
        Ok(subs.iter().map(|s| s.key.clone()).collect())
    }

    fn disconnect(&self, key: &SubscriptionKey) -> Result<bool, RegistryError> {
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| lock_err("channel.subscriptions"))?;
        match subs.iter().position(|s| &s.key == key) {
            Some(index) => {
                subs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self) -> Result<(), RegistryError> {
        self.subscriptions
            .write()
            .map_err(|_| lock_err("channel.subscriptions"))?
            .clear();
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Typed handle to a registered channel.
pub struct ChannelHandle<A, R> {
    pub(crate) inner: Arc<Channel<A, R>>,
}

impl<A, R> Clone for ChannelHandle<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: 'static, R: 'static> ChannelHandle<A, R> {
    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Scope the channel lives in.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.inner.scope
    }

    /// Argument and return types of the channel.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::of::<A, R>()
    }

    /// Number of active subscriptions (0 if the lock is poisoned).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Subscription keys in registration order.
    pub fn subscribers(&self) -> Result<Vec<SubscriptionKey>, RegistryError> {
        self.inner.subscribers()
    }
}

impl<A: 'static, R: 'static> fmt::Debug for ChannelHandle<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.name())
            .field("scope", &self.scope())
            .field("signature", &self.signature())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Untyped description of a channel, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel name.
    pub name: String,
    /// Owning scope.
    pub scope: Scope,
    /// Argument and return types.
    pub signature: Signature,
    /// Active subscriptions.
    pub subscribers: usize,
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} ({} subscribers)",
            self.name, self.scope, self.signature, self.subscribers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(slot: &str, kind: SlotKind) -> SubscriptionKey {
        SubscriptionKey::new(WatcherId::new(), slot, kind)
    }

    #[test]
    fn test_connect_rejects_same_key() {
        let ch: Channel<(), u8> = Channel::new("c".to_string(), Scope::Instance);
        let k = key("s", SlotKind::Instance);
        assert!(ch.connect(k.clone(), Arc::new(|(): &()| 1u8)).unwrap());
        assert!(!ch.connect(k, Arc::new(|(): &()| 2u8)).unwrap());
        assert_eq!(ch.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_same_slot_different_kind_are_distinct() {
        let ch: Channel<(), u8> = Channel::new("c".to_string(), Scope::Instance);
        let id = WatcherId::new();
        let a = SubscriptionKey::new(id, "s", SlotKind::Instance);
        let b = SubscriptionKey::new(id, "s", SlotKind::Static);
        assert!(ch.connect(a.clone(), Arc::new(|(): &()| 1u8)).unwrap());
        assert!(ch.connect(b.clone(), Arc::new(|(): &()| 2u8)).unwrap());

        assert!(ch.disconnect(&b).unwrap());
        assert_eq!(ch.subscribers().unwrap(), vec![a]);
    }

    #[test]
    fn test_disconnect_missing_is_noop() {
        let ch: Channel<(), u8> = Channel::new("c".to_string(), Scope::Process);
        assert!(!ch.disconnect(&key("s", SlotKind::Instance)).unwrap());
    }

    #[test]
    fn test_clear_drops_all() {
        let ch: Channel<(), u8> = Channel::new("c".to_string(), Scope::Process);
        ch.connect(key("a", SlotKind::Instance), Arc::new(|(): &()| 1u8))
            .unwrap();
        ch.connect(key("b", SlotKind::Instance), Arc::new(|(): &()| 2u8))
            .unwrap();
        ch.clear().unwrap();
        assert!(ch.snapshot().unwrap().is_empty());
    }
}
