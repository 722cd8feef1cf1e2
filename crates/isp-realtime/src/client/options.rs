//! Client options
//!
//! Defaults: auto-connect on creation, 3 s base retry interval doubling per
//! attempt up to 30 s, at most 10 consecutive retries, no heartbeat.

use crate::endpoint::{parse_ws_url, resolve_endpoint};
use crate::error::{ClientError, ClientResult};
use isp_common::RealtimeConfig;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Capacity of the lifecycle event channel
const EVENT_BUFFER: usize = 256;

/// Exponential backoff policy for automatic reconnects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect automatically after an unexpected close
    pub enabled: bool,
    /// Delay before the first retry
    pub base_interval: Duration,
    /// Consecutive retries before giving up
    pub max_attempts: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_interval.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether another retry is allowed after `attempts` consecutive failures
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

/// Ping/pong liveness check
///
/// Both durations are non-zero; the only way in is [`HeartbeatConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    interval: Duration,
    timeout: Duration,
}

impl HeartbeatConfig {
    pub fn new(interval: Duration, timeout: Duration) -> ClientResult<Self> {
        if interval.is_zero() {
            return Err(ClientError::invalid_option("heartbeat interval must be non-zero"));
        }
        if timeout.is_zero() {
            return Err(ClientError::invalid_option("heartbeat timeout must be non-zero"));
        }
        Ok(Self { interval, timeout })
    }

    /// Time between pings
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to wait for a pong before declaring the socket dead
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Options for a [`RealtimeClient`](crate::RealtimeClient)
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub url: Url,
    pub auto_connect: bool,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: Option<HeartbeatConfig>,
    pub event_buffer: usize,
}

impl ClientOptions {
    /// Options with defaults for the given endpoint
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auto_connect: true,
            reconnect: ReconnectPolicy::default(),
            heartbeat: None,
            event_buffer: EVENT_BUFFER,
        }
    }

    /// Options for an explicit `ws://` or `wss://` URL
    pub fn parse(url: &str) -> ClientResult<Self> {
        Ok(Self::new(parse_ws_url(url)?))
    }

    /// Options from loaded configuration
    pub fn from_config(config: &RealtimeConfig) -> ClientResult<Self> {
        let url = resolve_endpoint(config.url.as_deref(), config.origin.as_deref(), &config.path)?;

        if config.reconnect_interval_ms == 0 {
            return Err(ClientError::invalid_option("reconnect interval must be non-zero"));
        }
        if config.max_reconnect_delay_ms < config.reconnect_interval_ms {
            return Err(ClientError::invalid_option(
                "max reconnect delay must not be below the reconnect interval",
            ));
        }

        let heartbeat = match config.heartbeat_interval_ms {
            Some(interval_ms) => {
                let timeout_ms = config.heartbeat_timeout_ms.unwrap_or(interval_ms);
                Some(HeartbeatConfig::new(
                    Duration::from_millis(interval_ms),
                    Duration::from_millis(timeout_ms),
                )?)
            }
            None => None,
        };

        Ok(Self {
            url,
            auto_connect: config.auto_connect,
            reconnect: ReconnectPolicy {
                enabled: true,
                base_interval: Duration::from_millis(config.reconnect_interval_ms),
                max_attempts: config.max_reconnect_attempts,
                max_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            },
            heartbeat,
            event_buffer: EVENT_BUFFER,
        })
    }

    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect.enabled = enabled;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect.base_interval = interval;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.max_attempts = attempts;
        self
    }

    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect.max_delay = delay;
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}
