//! Channel-backed subscriptions
//!
//! Message-passing alternative to callbacks: each stream owns a queue fed by a
//! registry listener and unsubscribes itself when dropped.

use super::registry::{SharedRegistry, Subscription};
use crate::protocol::Channel;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Stream of payloads delivered on one channel
///
/// Yields the same values a callback on that channel would receive. The stream
/// stays open for as long as it is registered.
pub struct ChannelStream {
    receiver: mpsc::UnboundedReceiver<Value>,
    subscription: Option<Subscription>,
    channel: Channel,
}

impl ChannelStream {
    pub(crate) fn register(registry: &SharedRegistry, channel: Channel) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();

        let subscription = Subscription::register(
            registry,
            channel.clone(),
            Arc::new(move |value: &Value| {
                // Receiver gone means the stream is being dropped
                let _ = tx.send(value.clone());
            }),
        );

        Self {
            receiver,
            subscription: Some(subscription),
            channel,
        }
    }

    /// The channel this stream listens on
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Receive the next payload
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Take a payload if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for ChannelStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStream")
            .field("channel", &self.channel)
            .finish()
    }
}
