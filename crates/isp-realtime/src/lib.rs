//! # isp-realtime
//!
//! Client for the operations dashboard's realtime push channel.
//!
//! The server pushes JSON envelopes (`{"type", "data", "timestamp"}`) over a
//! WebSocket. The client routes each envelope to the listeners registered for
//! its `type`, and to wildcard listeners, and keeps the socket alive with
//! capped exponential backoff.
//!
//! ```no_run
//! use isp_realtime::{ClientOptions, RealtimeClient};
//!
//! # async fn demo() -> Result<(), isp_realtime::ClientError> {
//! let client = RealtimeClient::new(ClientOptions::parse("wss://noc.example.net/ws")?);
//! let _sub = client.subscribe("olt_status", |data| println!("OLT update: {data}"));
//! client.send("ack_alarm", serde_json::json!({"alarm_id": 42}));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod subscription;
pub mod transport;

pub use client::{
    ClientEvent, ClientOptions, ConnectionStatus, HeartbeatConfig, RealtimeClient, ReconnectPolicy,
};
pub use endpoint::resolve_endpoint;
pub use error::{ClientError, ClientResult};
pub use protocol::{Channel, Envelope, EnvelopeError, WILDCARD_CHANNEL};
pub use subscription::{ChannelStream, Subscription};
pub use transport::{Connector, MemoryConnector, TungsteniteConnector};
