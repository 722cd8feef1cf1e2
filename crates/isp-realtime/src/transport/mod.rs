//! Socket transport
//!
//! The client talks to a [`Connector`], which opens a socket and hands back a
//! frame sink and a frame stream. Production uses [`TungsteniteConnector`];
//! [`MemoryConnector`] runs the same client logic in-process.

mod memory;
mod tungstenite;

pub use memory::{ConnectOutcome, MemoryConnector, MemoryServer, MemorySession};
pub use tungstenite::TungsteniteConnector;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use url::Url;

/// Close code for a deliberate, normal shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// A WebSocket frame, independent of the socket implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseReason>),
}

/// Close frame code and reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Normal closure sent by `disconnect()`
    #[must_use]
    pub fn normal() -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: "client disconnect".to_string(),
        }
    }
}

/// Transport-level failures
///
/// These never reach callers of the client; they drive the status and the
/// reconnect loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("Heartbeat timed out")]
    HeartbeatTimeout,

    #[error("Connection closed")]
    Closed,
}

/// Outgoing half of an open socket
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Incoming half of an open socket
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open socket
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens sockets
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `url`
    async fn connect(&self, url: &Url) -> Result<Transport, TransportError>;
}
