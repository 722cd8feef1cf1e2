//! Test helpers for integration tests
//!
//! Provides an in-process WebSocket server that can push envelopes, drop its
//! peers, and go away and come back, plus client-side wait helpers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use isp_realtime::{ClientEvent, ClientOptions, ConnectionStatus, Envelope, RealtimeClient};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// How long any single wait may take before the test fails
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Path the test server serves the socket on
pub const WS_PATH: &str = "/ws";

#[derive(Debug, Clone)]
enum ServerCommand {
    Push(String),
    CloseAll,
}

struct ServerState {
    commands: broadcast::Sender<ServerCommand>,
    inbound: mpsc::UnboundedSender<String>,
    accepted: watch::Sender<usize>,
    live: watch::Sender<usize>,
}

/// WebSocket server bound to an ephemeral localhost port
pub struct TestWsServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    handle: Option<JoinHandle<()>>,
}

impl TestWsServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        let (commands, _) = broadcast::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (accepted, _) = watch::channel(0);
        let (live, _) = watch::channel(0);

        let state = Arc::new(ServerState {
            commands,
            inbound: inbound_tx,
            accepted,
            live,
        });

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = spawn_server(listener, state.clone());

        Ok(Self {
            addr,
            state,
            inbound: Mutex::new(inbound_rx),
            handle: Some(handle),
        })
    }

    /// Socket URL for clients
    pub fn url(&self) -> String {
        format!("ws://{}{WS_PATH}", self.addr)
    }

    /// Page origin the socket URL derives from
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Push an envelope to every connected client
    pub fn push(&self, envelope: &Envelope) -> Result<()> {
        self.push_text(envelope.to_json()?)
    }

    /// Push a raw text frame to every connected client
    pub fn push_text(&self, text: impl Into<String>) -> Result<()> {
        self.state
            .commands
            .send(ServerCommand::Push(text.into()))
            .map(|_| ())
            .map_err(|_| anyhow!("no connected clients"))
    }

    /// Close every open connection with a close frame
    pub fn close_all(&self) {
        let _ = self.state.commands.send(ServerCommand::CloseAll);
    }

    /// Connections accepted since start
    pub fn accepted(&self) -> usize {
        *self.state.accepted.borrow()
    }

    /// Wait until `count` connections have been accepted since start
    pub async fn wait_for_accepted(&self, count: usize) -> Result<()> {
        let mut accepted = self.state.accepted.subscribe();
        tokio::time::timeout(TEST_TIMEOUT, accepted.wait_for(|n| *n >= count))
            .await
            .with_context(|| format!("timed out waiting for {count} accepted connections"))??;
        Ok(())
    }

    /// Connections currently open
    pub fn live(&self) -> usize {
        *self.state.live.borrow()
    }

    /// Wait until exactly `count` connections are open
    pub async fn wait_for_live(&self, count: usize) -> Result<()> {
        let mut live = self.state.live.subscribe();
        tokio::time::timeout(TEST_TIMEOUT, live.wait_for(|n| *n == count))
            .await
            .with_context(|| format!("timed out waiting for {count} live connections"))??;
        Ok(())
    }

    /// Next text frame any client sent, decoded as an envelope
    pub async fn next_inbound(&self) -> Result<Envelope> {
        let mut inbound = self.inbound.lock().await;
        let text = tokio::time::timeout(TEST_TIMEOUT, inbound.recv())
            .await
            .context("timed out waiting for a client message")?
            .ok_or_else(|| anyhow!("server state dropped"))?;
        Ok(Envelope::from_json(&text)?)
    }

    /// Stop accepting connections and drop every open one
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.close_all();
    }

    /// Listen again on the same address
    pub async fn restart(&mut self) -> Result<()> {
        self.stop().await;
        let listener = TcpListener::bind(self.addr).await?;
        self.handle = Some(spawn_server(listener, self.state.clone()));
        Ok(())
    }
}

impl Drop for TestWsServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        let _ = self.state.commands.send(ServerCommand::CloseAll);
    }
}

fn spawn_server(listener: TcpListener, state: Arc<ServerState>) -> JoinHandle<()> {
    let app = Router::new()
        .route(WS_PATH, get(ws_handler))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    // Subscribe before announcing the connection so no push is missed
    let mut commands = state.commands.subscribe();
    state.accepted.send_modify(|n| *n += 1);
    state.live.send_modify(|n| *n += 1);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Ok(ServerCommand::Push(text)) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(ServerCommand::CloseAll) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.inbound.send(text);
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.live.send_modify(|n| *n -= 1);
}

/// Client options tuned for fast tests: no auto-connect, short backoff
pub fn fast_options(url: &str) -> Result<ClientOptions> {
    Ok(ClientOptions::parse(url)?
        .auto_connect(false)
        .reconnect_interval(Duration::from_millis(50))
        .max_reconnect_delay(Duration::from_millis(200)))
}

/// Wait until the client reports `status`
pub async fn wait_for_status(client: &RealtimeClient, status: ConnectionStatus) -> Result<()> {
    let mut rx = client.watch_status();
    tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|s| *s == status))
        .await
        .with_context(|| format!("timed out waiting for status {status}"))??;
    Ok(())
}

/// Wait for the first lifecycle event matching `pred`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<ClientEvent>,
    pred: F,
) -> Result<ClientEvent>
where
    F: Fn(&ClientEvent) -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow!("client event channel closed"))
                }
            }
        }
    })
    .await
    .context("timed out waiting for client event")?
}
