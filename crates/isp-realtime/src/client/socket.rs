//! Socket task
//!
//! One task per connection attempt: open the transport, pump frames both ways,
//! run the heartbeat, and report lifecycle changes back to the client. Every
//! report carries the task's generation, and the client ignores reports from a
//! socket it has already replaced or closed.

use super::options::HeartbeatConfig;
use super::realtime::ClientInner;
use crate::transport::{CloseReason, Frame, FrameSink, Transport, TransportError};
use futures::{SinkExt, StreamExt};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Upper bound on the close handshake of a deliberately closed socket
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Commands from the client handle to its socket task
#[derive(Debug)]
pub(crate) enum Outbound {
    Text(String),
    Close,
}

/// Why the frame loop stopped
enum Exit {
    /// `disconnect()`, `reconnect()` or the client was dropped
    Requested,
    /// Server sent a close frame or the stream ended
    Closed(Option<CloseReason>),
    Failed(TransportError),
}

pub(super) async fn run(
    client: Weak<ClientInner>,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let Some((connector, url, heartbeat)) = client
        .upgrade()
        .map(|c| (c.connector.clone(), c.options.url.clone(), c.options.heartbeat))
    else {
        return;
    };

    let _guard = PanicGuard {
        client: client.clone(),
        generation,
    };

    tracing::debug!(url = %url, generation, "Opening socket");

    let Transport { mut sink, mut stream } = match connector.connect(&url).await {
        Ok(transport) => transport,
        Err(e) => {
            if let Some(c) = client.upgrade() {
                c.on_failure(generation, &e);
                c.on_closed(generation);
            }
            return;
        }
    };

    if !client.upgrade().is_some_and(|c| c.on_open(generation)) {
        // Superseded while the handshake was in flight
        close_gracefully(&mut sink).await;
        return;
    }

    let mut heartbeat = heartbeat.map(Heartbeat::new);

    let exit = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    let Some(c) = client.upgrade() else { break Exit::Requested };
                    c.on_text(generation, &text);
                }
                Some(Ok(Frame::Binary(bytes))) => {
                    let Some(c) = client.upgrade() else { break Exit::Requested };
                    c.on_binary(generation, &bytes);
                }
                Some(Ok(Frame::Pong(_))) => {
                    if let Some(hb) = heartbeat.as_mut() {
                        hb.acknowledge();
                    }
                }
                // Answered by the socket implementation
                Some(Ok(Frame::Ping(_))) => {}
                Some(Ok(Frame::Close(reason))) => break Exit::Closed(reason),
                Some(Err(e)) => break Exit::Failed(e),
                None => break Exit::Closed(None),
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Frame::Text(text)).await {
                        break Exit::Failed(e);
                    }
                }
                Some(Outbound::Close) | None => break Exit::Requested,
            },
            () = next_beat(&mut heartbeat) => {
                let Some(hb) = heartbeat.as_mut() else { continue };
                match hb.on_tick() {
                    Beat::Ping => {
                        tracing::trace!(url = %url, "Sending heartbeat ping");
                        if let Err(e) = sink.send(Frame::Ping(Vec::new())).await {
                            break Exit::Failed(e);
                        }
                    }
                    Beat::Waiting => {}
                    Beat::TimedOut => break Exit::Failed(TransportError::HeartbeatTimeout),
                }
            }
        }
    };

    match exit {
        Exit::Requested => {
            close_gracefully(&mut sink).await;
            tracing::debug!(url = %url, generation, "Socket closed");
        }
        Exit::Closed(reason) => {
            tracing::info!(
                url = %url,
                code = ?reason.as_ref().map(|r| r.code),
                reason = reason.as_ref().map_or("", |r| r.reason.as_str()),
                "Server closed connection"
            );
            if let Some(c) = client.upgrade() {
                c.on_closed(generation);
            }
        }
        Exit::Failed(e) => {
            if let Some(c) = client.upgrade() {
                c.on_failure(generation, &e);
                c.on_closed(generation);
            }
        }
    }
}

/// Reports a panicking socket task as a failed and closed socket
///
/// Without it the slot would stay `open` with nobody reading from it.
struct PanicGuard {
    client: Weak<ClientInner>,
    generation: u64,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        if let Some(c) = self.client.upgrade() {
            c.on_failure(
                self.generation,
                &TransportError::Socket("socket task panicked".to_string()),
            );
            c.on_closed(self.generation);
        }
    }
}

async fn close_gracefully(sink: &mut FrameSink) {
    let handshake = async {
        sink.send(Frame::Close(Some(CloseReason::normal()))).await?;
        sink.close().await
    };

    match time::timeout(CLOSE_TIMEOUT, handshake).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(error = %e, "Close handshake failed"),
        Err(_) => tracing::trace!("Close handshake timed out"),
    }
}

async fn next_beat(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(hb) => {
            hb.ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Heartbeat decision for one tick
#[derive(Debug, PartialEq, Eq)]
enum Beat {
    Ping,
    Waiting,
    TimedOut,
}

/// Ping/pong bookkeeping
///
/// One ping is outstanding at a time. A timeout is detected on the first tick
/// after it elapses.
struct Heartbeat {
    ticker: Interval,
    timeout: Duration,
    awaiting_since: Option<Instant>,
}

impl Heartbeat {
    fn new(config: HeartbeatConfig) -> Self {
        let mut ticker = time::interval_at(Instant::now() + config.interval(), config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            timeout: config.timeout(),
            awaiting_since: None,
        }
    }

    fn on_tick(&mut self) -> Beat {
        match self.awaiting_since {
            Some(sent) if sent.elapsed() >= self.timeout => Beat::TimedOut,
            Some(_) => Beat::Waiting,
            None => {
                self.awaiting_since = Some(Instant::now());
                Beat::Ping
            }
        }
    }

    fn acknowledge(&mut self) {
        self.awaiting_since = None;
    }
}
