//! Connection status and lifecycle events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl ConnectionStatus {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notifications broadcast by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Status moved to a new value
    StatusChanged(ConnectionStatus),
    /// A retry timer was armed
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The retry ceiling was reached; no further automatic attempts
    ReconnectExhausted { attempts: u32 },
    /// No pong arrived within the heartbeat timeout
    HeartbeatTimeout,
}
