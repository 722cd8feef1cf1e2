//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub realtime: RealtimeConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Realtime push channel configuration
///
/// `url` wins when set. Otherwise the endpoint is derived from `origin`
/// (the dashboard's own origin) plus `path`.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: Option<String>,
    pub origin: Option<String>,
    pub path: String,
    pub auto_connect: bool,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    pub max_reconnect_delay_ms: u64,
    /// Ping interval; heartbeat is disabled when unset
    pub heartbeat_interval_ms: Option<u64>,
    pub heartbeat_timeout_ms: Option<u64>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: None,
            origin: None,
            path: default_ws_path(),
            auto_connect: default_auto_connect(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            heartbeat_interval_ms: None,
            heartbeat_timeout_ms: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "isp-dashboard".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_auto_connect() -> bool {
    true
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let env = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
            None => Environment::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            realtime: RealtimeConfig {
                url: non_empty(lookup("REALTIME_WS_URL")),
                origin: non_empty(lookup("REALTIME_ORIGIN")),
                path: non_empty(lookup("REALTIME_WS_PATH")).unwrap_or_else(default_ws_path),
                auto_connect: parse_var(&lookup, "REALTIME_AUTO_CONNECT")?
                    .unwrap_or_else(default_auto_connect),
                reconnect_interval_ms: parse_var(&lookup, "REALTIME_RECONNECT_INTERVAL_MS")?
                    .unwrap_or_else(default_reconnect_interval_ms),
                max_reconnect_attempts: parse_var(&lookup, "REALTIME_MAX_RECONNECT_ATTEMPTS")?
                    .unwrap_or_else(default_max_reconnect_attempts),
                max_reconnect_delay_ms: parse_var(&lookup, "REALTIME_MAX_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_max_reconnect_delay_ms),
                heartbeat_interval_ms: parse_var(&lookup, "REALTIME_HEARTBEAT_INTERVAL_MS")?,
                heartbeat_timeout_ms: parse_var(&lookup, "REALTIME_HEARTBEAT_TIMEOUT_MS")?,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
