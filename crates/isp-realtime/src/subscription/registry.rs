//! Subscription registry
//!
//! Maps channels to their ordered listener lists. A channel entry exists only
//! while it has at least one listener.

use crate::protocol::Channel;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Listener callback
///
/// Named-channel listeners receive the envelope `data`; wildcard listeners
/// receive the whole envelope as a JSON value.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry shared between a client and its subscription handles
pub(crate) type SharedRegistry = Arc<Mutex<SubscriptionRegistry>>;

/// Identifies one registration within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Channel -> listeners mapping
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: HashMap<Channel, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, appended after existing listeners on the channel
    pub fn insert(&mut self, channel: Channel, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.channels.entry(channel).or_default().push((id, listener));
        id
    }

    /// Remove one registration
    ///
    /// Returns false if it was already gone. Drops the channel entry once empty.
    pub fn remove(&mut self, channel: &Channel, id: ListenerId) -> bool {
        let Some(listeners) = self.channels.get_mut(channel) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            self.channels.remove(channel);
        }

        removed
    }

    /// Snapshot of the listeners on a channel, in registration order
    #[must_use]
    pub fn listeners(&self, channel: &Channel) -> Vec<Listener> {
        self.channels
            .get(channel)
            .map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_channel(&self, channel: &Channel) -> bool {
        self.channels.contains_key(channel)
    }

    #[must_use]
    pub fn listener_count(&self, channel: &Channel) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Number of channels with at least one listener
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("channels", &self.channels.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Handle for one registration
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it. The handle does not keep the
/// client alive.
#[must_use = "dropping a Subscription keeps the listener registered"]
pub struct Subscription {
    registry: Weak<Mutex<SubscriptionRegistry>>,
    channel: Channel,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn register(registry: &SharedRegistry, channel: Channel, listener: Listener) -> Self {
        let id = registry.lock().insert(channel.clone(), listener);

        tracing::trace!(channel = %channel, "Listener subscribed");

        Self {
            registry: Arc::downgrade(registry),
            channel,
            id,
        }
    }

    /// The channel this registration listens on
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove exactly this listener
    ///
    /// Other listeners on the same channel are untouched. Returns false if the
    /// client is gone or the registration was already cleared.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };

        let removed = registry.lock().remove(&self.channel, self.id);

        tracing::trace!(channel = %self.channel, removed, "Listener unsubscribed");

        removed
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}
