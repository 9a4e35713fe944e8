//! Named event registry with typed publish/subscribe dispatch.
//!
//! Channels are created under a name with a fixed signature `fn(&A) -> R`.
//! Watchers expose slots; connecting a slot appends a subscription, and
//! invoking a channel calls every subscriber in registration order and
//! returns all of their results.
//!
//! Two scopes exist: each [`EventHub`] owns a private instance registry, and
//! all hubs share the process registry managed by [`global`].

/// Typed channels and subscription bookkeeping.
pub mod channel;
/// Process-wide registry lifecycle.
pub mod global;
/// Scope-routing handler object.
pub mod hub;
/// Invoke deadlines and cancellation.
pub mod invoke;
/// Signatures and scopes.
pub mod signature;
/// The channel registry.
pub mod store;
/// Watchers and slots.
pub mod watcher;

pub use channel::{ChannelHandle, ChannelInfo, SubscriptionKey};
pub use hub::EventHub;
pub use invoke::{CancellationToken, InvokeOptions};
pub use signature::{Scope, Signature};
pub use store::EventRegistry;
pub use watcher::{Slot, SlotFn, SlotKind, SlotTable, Watcher, WatcherId};
