//! Realtime client
//!
//! Connection lifecycle, reconnect policy, heartbeat, and the public handle.

mod options;
mod realtime;
mod socket;
mod status;

pub use options::{
    ClientOptions, HeartbeatConfig, ReconnectPolicy, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_INTERVAL,
};
pub use realtime::RealtimeClient;
pub use status::{ClientEvent, ConnectionStatus};
