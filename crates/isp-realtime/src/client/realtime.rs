//! Realtime client
//!
//! [`RealtimeClient`] is a cheap-to-clone handle. All clones share one socket,
//! one subscription registry and one reconnect state machine.
//!
//! Lifecycle:
//! - `connect()` opens a socket unless one is already active
//! - an unexpected close schedules a retry after `base * 2^attempts`, capped
//! - a successful open resets the attempt counter
//! - `disconnect()` cancels any pending retry and closes the socket for good

use super::options::ClientOptions;
use super::socket::{self, Outbound};
use super::status::{ClientEvent, ConnectionStatus};
use crate::protocol::{Channel, Envelope, EnvelopeError};
use crate::subscription::{dispatch, ChannelStream, SharedRegistry, Subscription, SubscriptionRegistry};
use crate::transport::{Connector, TransportError, TungsteniteConnector};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

/// Handle to a realtime push channel
///
/// Must be created inside a Tokio runtime. The socket is closed when the last
/// handle is dropped.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(super) options: ClientOptions,
    pub(super) connector: Arc<dyn Connector>,
    registry: SharedRegistry,
    lifecycle: Mutex<Lifecycle>,
    status: watch::Sender<ConnectionStatus>,
    last_message: watch::Sender<Option<Envelope>>,
    events: broadcast::Sender<ClientEvent>,
}

#[derive(Default)]
struct Lifecycle {
    /// Incremented for every socket task spawned
    generation: u64,
    socket: Option<SocketSlot>,
    retry: Option<RetryTimer>,
    next_timer_id: u64,
    /// Consecutive reconnect attempts since the last successful open
    attempts: u32,
}

struct SocketSlot {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    open: bool,
    task: JoinHandle<()>,
}

struct RetryTimer {
    id: u64,
    task: JoinHandle<()>,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.socket.as_ref().is_some_and(|s| s.generation == generation)
    }

    fn cancel_retry(&mut self) -> bool {
        match self.retry.take() {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }
}

impl SocketSlot {
    fn shutdown(self) {
        if self.open {
            let _ = self.outbound.send(Outbound::Close);
        } else {
            // Still handshaking; nothing to close gracefully
            self.task.abort();
        }
    }
}

impl RealtimeClient {
    /// Client over real WebSockets
    pub fn new(options: ClientOptions) -> Self {
        Self::with_connector(options, Arc::new(TungsteniteConnector))
    }

    /// Client over a custom transport
    pub fn with_connector(options: ClientOptions, connector: Arc<dyn Connector>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (last_message, _) = watch::channel(None);
        // broadcast::channel rejects a zero capacity
        let (events, _) = broadcast::channel(options.event_buffer.max(1));
        let auto_connect = options.auto_connect;

        let inner = Arc::new(ClientInner {
            options,
            connector,
            registry: Arc::new(Mutex::new(SubscriptionRegistry::new())),
            lifecycle: Mutex::new(Lifecycle::default()),
            status,
            last_message,
            events,
        });

        tracing::debug!(url = %inner.options.url, auto_connect, "Realtime client created");

        if auto_connect {
            inner.connect();
        }

        Self { inner }
    }

    /// Open the socket; no-op while one is connecting or open
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Cancel any pending retry and close the socket without reconnecting
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Close the socket, reset the retry counter and connect again
    pub fn reconnect(&self) {
        self.inner.disconnect();
        self.inner.lifecycle.lock().attempts = 0;
        self.inner.connect();
    }

    /// Register a callback for a channel
    ///
    /// Named channels receive the envelope's `data`; the wildcard channel
    /// receives the whole envelope as JSON.
    pub fn subscribe<F>(&self, channel: impl Into<Channel>, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let channel = channel.into();
        tracing::debug!(channel = %channel, "Listener subscribed");
        Subscription::register(&self.inner.registry, channel, Arc::new(listener))
    }

    /// Register a stream for a channel; dropping the stream unsubscribes
    pub fn subscribe_stream(&self, channel: impl Into<Channel>) -> ChannelStream {
        let channel = channel.into();
        tracing::debug!(channel = %channel, "Stream subscribed");
        ChannelStream::register(&self.inner.registry, channel)
    }

    /// Send an envelope to the server
    ///
    /// Returns `false` and drops the message when the socket is not open.
    /// Nothing is queued for later delivery.
    pub fn send<T: Serialize>(&self, event_type: &str, data: T) -> bool {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event_type = %event_type, error = %e, "Failed to serialize payload");
                return false;
            }
        };

        let json = match Envelope::new(event_type, data).to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(event_type = %event_type, error = %e, "Failed to encode envelope");
                return false;
            }
        };

        let lifecycle = self.inner.lifecycle.lock();
        match lifecycle.socket.as_ref() {
            Some(slot) if slot.open => {
                if slot.outbound.send(Outbound::Text(json)).is_ok() {
                    tracing::trace!(event_type = %event_type, "Message queued for socket");
                    true
                } else {
                    tracing::warn!(event_type = %event_type, "Socket task gone, message dropped");
                    false
                }
            }
            _ => {
                tracing::warn!(event_type = %event_type, "WebSocket not connected, message dropped");
                false
            }
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status().is_connected()
    }

    /// Receiver notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Most recent envelope that parsed successfully
    pub fn last_message(&self) -> Option<Envelope> {
        self.inner.last_message.borrow().clone()
    }

    pub fn watch_last_message(&self) -> watch::Receiver<Option<Envelope>> {
        self.inner.last_message.subscribe()
    }

    /// Lifecycle events: status changes, scheduled retries, exhaustion
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Consecutive reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lifecycle.lock().attempts
    }

    pub fn url(&self) -> &Url {
        &self.inner.options.url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Whether any listener is registered on the channel
    pub fn is_subscribed(&self, channel: &Channel) -> bool {
        self.inner.registry.lock().has_channel(channel)
    }

    /// Channels with at least one listener
    pub fn subscribed_channels(&self) -> Vec<Channel> {
        self.inner.registry.lock().channels()
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.inner.options.url.as_str())
            .field("status", &self.connection_status())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn connect(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.socket.is_some() {
            tracing::debug!(url = %self.options.url, "Socket already active, connect ignored");
            return;
        }
        if lifecycle.cancel_retry() {
            tracing::debug!("Pending reconnect superseded by connect");
        }

        lifecycle.generation += 1;
        let generation = lifecycle.generation;
        let (outbound, rx) = mpsc::unbounded_channel();

        self.set_status(ConnectionStatus::Connecting);
        tracing::info!(url = %self.options.url, attempt = lifecycle.attempts, "Connecting to WebSocket");

        let task = tokio::spawn(socket::run(Arc::downgrade(self), generation, rx));
        lifecycle.socket = Some(SocketSlot {
            generation,
            outbound,
            open: false,
            task,
        });
    }

    fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.cancel_retry() {
            tracing::debug!("Pending reconnect cancelled");
        }
        if let Some(slot) = lifecycle.socket.take() {
            tracing::info!(url = %self.options.url, "Disconnecting");
            slot.shutdown();
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    pub(super) fn on_open(&self, generation: u64) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.socket.as_mut() {
            Some(slot) if slot.generation == generation => slot.open = true,
            _ => return false,
        }
        lifecycle.attempts = 0;
        self.set_status(ConnectionStatus::Connected);
        tracing::info!(url = %self.options.url, "WebSocket connected");
        true
    }

    pub(super) fn on_text(&self, generation: u64, text: &str) {
        self.on_payload(generation, Envelope::from_json(text));
    }

    pub(super) fn on_binary(&self, generation: u64, bytes: &[u8]) {
        self.on_payload(generation, Envelope::from_slice(bytes));
    }

    fn on_payload(&self, generation: u64, parsed: Result<Envelope, EnvelopeError>) {
        if !self.lifecycle.lock().is_current(generation) {
            return;
        }

        let envelope = match parsed {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse realtime message");
                return;
            }
        };

        tracing::trace!(event_type = %envelope.event_type, "Envelope received");
        self.last_message.send_replace(Some(envelope.clone()));
        dispatch(&self.registry, &envelope);
    }

    pub(super) fn on_failure(&self, generation: u64, error: &TransportError) {
        // Held so a concurrent disconnect() cannot interleave with the transition
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_current(generation) {
            return;
        }

        if matches!(error, TransportError::HeartbeatTimeout) {
            tracing::warn!(url = %self.options.url, "Heartbeat timed out, dropping socket");
            self.emit(ClientEvent::HeartbeatTimeout);
        } else {
            tracing::error!(url = %self.options.url, error = %error, "WebSocket error");
        }
        self.set_status(ConnectionStatus::Error);
    }

    pub(super) fn on_closed(self: &Arc<Self>, generation: u64) {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.is_current(generation) {
            return;
        }

        lifecycle.socket = None;
        self.set_status(ConnectionStatus::Disconnected);
        tracing::info!(url = %self.options.url, "WebSocket disconnected");
        self.schedule_reconnect(&mut lifecycle);
    }

    fn schedule_reconnect(self: &Arc<Self>, lifecycle: &mut Lifecycle) {
        let policy = &self.options.reconnect;
        if !policy.enabled {
            tracing::debug!("Automatic reconnect disabled");
            return;
        }
        if !policy.allows(lifecycle.attempts) {
            tracing::warn!(
                url = %self.options.url,
                attempts = lifecycle.attempts,
                "Max reconnect attempts reached, giving up"
            );
            self.emit(ClientEvent::ReconnectExhausted {
                attempts: lifecycle.attempts,
            });
            return;
        }

        let delay = policy.delay_for_attempt(lifecycle.attempts);
        lifecycle.attempts += 1;
        lifecycle.next_timer_id += 1;
        let attempt = lifecycle.attempts;
        let id = lifecycle.next_timer_id;

        tracing::info!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        self.emit(ClientEvent::ReconnectScheduled { attempt, delay });

        let client = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                client.fire_retry(id);
            }
        });
        lifecycle.retry = Some(RetryTimer { id, task });
    }

    fn fire_retry(self: &Arc<Self>, id: u64) {
        {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.retry.as_ref() {
                Some(timer) if timer.id == id => lifecycle.retry = None,
                _ => return,
            }
        }
        self.connect();
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(from = %previous, to = %status, "Connection status changed");
            self.emit(ClientEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: ClientEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        lifecycle.cancel_retry();
        if let Some(slot) = lifecycle.socket.take() {
            slot.shutdown();
        }
    }
}
