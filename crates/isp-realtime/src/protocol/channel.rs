//! Subscription channel names.
//!
//! A channel is either the `type` of an envelope or the wildcard `*`.

/// Wildcard channel name: receives every envelope
pub const WILDCARD_CHANNEL: &str = "*";

/// Subscription channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Envelopes whose `type` equals the name
    Named(String),
    /// Every envelope, delivered whole
    Wildcard,
}

impl Channel {
    /// Create a named channel
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Create the wildcard channel
    #[must_use]
    pub fn wildcard() -> Self {
        Self::Wildcard
    }

    /// Get the channel name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Wildcard => WILDCARD_CHANNEL,
        }
    }

    /// Parse a channel name; `*` is the wildcard
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name == WILDCARD_CHANNEL {
            Self::Wildcard
        } else {
            Self::Named(name.to_string())
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        if name == WILDCARD_CHANNEL {
            Self::Wildcard
        } else {
            Self::Named(name)
        }
    }
}

impl From<&Channel> for Channel {
    fn from(channel: &Channel) -> Self {
        channel.clone()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
