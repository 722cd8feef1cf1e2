//! Realtime wire protocol
//!
//! Defines the JSON envelope and the channel naming used for routing.

mod channel;
mod envelope;

pub use channel::{Channel, WILDCARD_CHANNEL};
pub use envelope::{Envelope, EnvelopeError};
