//! Realtime channel monitor
//!
//! Connects to the dashboard push channel and logs every delivery.
//!
//! Run with:
//! ```bash
//! REALTIME_ORIGIN=https://noc.example.net cargo run -p isp-realtime -- olt_status alarm
//! ```
//!
//! Without arguments every envelope is logged through a wildcard subscription.
//! Configuration is loaded from environment variables.

use isp_common::{
    try_init_tracing_with_config, AppConfig, AppError, AppResult, ConfigError, TracingConfig,
};
use isp_realtime::{Channel, ClientEvent, ClientOptions, RealtimeClient, Subscription};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Realtime monitor failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> AppResult<()> {
    let config = init_telemetry(AppConfig::from_env())?;

    let options = ClientOptions::from_config(&config.realtime).map_err(AppError::realtime)?;

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        url = %options.url,
        heartbeat = options.heartbeat.is_some(),
        "Configuration loaded"
    );

    let channels = channels_from_args(std::env::args().skip(1));
    let client = RealtimeClient::new(options);
    let mut events = client.events();

    let subscriptions: Vec<Subscription> = channels
        .into_iter()
        .map(|channel| {
            let name = channel.to_string();
            client.subscribe(channel, move |payload| {
                info!(channel = %name, payload = %payload, "Realtime message");
            })
        })
        .collect();

    // No-op when auto-connect already started the socket
    client.connect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            result = &mut shutdown => {
                info!("Shutdown signal received");
                break result.map_err(AppError::internal);
            }
            event = events.recv() => match event {
                Ok(ClientEvent::ReconnectExhausted { attempts }) => {
                    break Err(AppError::realtime(format!(
                        "gave up after {attempts} reconnect attempts"
                    )));
                }
                Ok(ClientEvent::HeartbeatTimeout) => warn!("Server stopped answering pings"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Lifecycle events lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    client.disconnect();
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    info!("Realtime monitor stopped");

    outcome
}

/// Install the subscriber before anything is logged
///
/// The environment picks the format; a config that failed to load falls back
/// to the default format so its error is still printed.
fn init_telemetry(config: Result<AppConfig, ConfigError>) -> AppResult<AppConfig> {
    let tracing_config = match &config {
        Ok(config) => TracingConfig::for_environment(config.app.env),
        Err(_) => TracingConfig::default(),
    };
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    config.map_err(AppError::from)
}

fn channels_from_args(args: impl Iterator<Item = String>) -> Vec<Channel> {
    let channels: Vec<Channel> = args
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .map(|arg| Channel::parse(&arg))
        .collect();

    if channels.is_empty() {
        vec![Channel::Wildcard]
    } else {
        channels
    }
}
