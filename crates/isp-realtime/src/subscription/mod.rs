//! Subscription management
//!
//! Registry of channel listeners, fan-out delivery, and stream-based subscriptions.

mod dispatch;
mod registry;
mod stream;

pub use dispatch::{dispatch, DeliveryReport};
pub use registry::{Listener, ListenerId, Subscription, SubscriptionRegistry};
pub use stream::ChannelStream;

pub(crate) use registry::SharedRegistry;
