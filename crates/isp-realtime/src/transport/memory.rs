//! In-process transport
//!
//! [`MemoryConnector`] accepts or refuses each connection attempt according to
//! a script, and hands every accepted socket to the paired [`MemoryServer`] as
//! a [`MemorySession`] the test can drive from the server side.

use super::{Connector, Frame, Transport, TransportError};
use crate::protocol::Envelope;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// How the in-memory server answers one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accept,
    Refuse,
}

/// Scripted connector for tests and local tooling
#[derive(Debug)]
pub struct MemoryConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    fallback: Mutex<ConnectOutcome>,
    attempts: AtomicUsize,
    sessions: mpsc::UnboundedSender<MemorySession>,
}

impl MemoryConnector {
    /// Connector that accepts every attempt unless scripted otherwise
    #[must_use]
    pub fn new() -> (Arc<Self>, MemoryServer) {
        Self::with_fallback(ConnectOutcome::Accept)
    }

    /// Connector that refuses every attempt unless scripted otherwise
    #[must_use]
    pub fn refusing() -> (Arc<Self>, MemoryServer) {
        Self::with_fallback(ConnectOutcome::Refuse)
    }

    fn with_fallback(fallback: ConnectOutcome) -> (Arc<Self>, MemoryServer) {
        let (tx, rx) = mpsc::unbounded();
        let connector = Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            attempts: AtomicUsize::new(0),
            sessions: tx,
        });
        (connector, MemoryServer { sessions: rx })
    }

    /// Queue the outcome of the next unscripted attempt
    pub fn push_outcome(&self, outcome: ConnectOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Change the outcome used once the script runs out
    pub fn set_fallback(&self, outcome: ConnectOutcome) {
        *self.fallback.lock() = outcome;
    }

    /// Number of connection attempts made so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ConnectOutcome {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.fallback.lock())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &Url) -> Result<Transport, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.next_outcome() == ConnectOutcome::Refuse {
            tracing::trace!(attempt, url = %url, "Memory connector refused attempt");
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::unbounded();

        let session = MemorySession {
            url: url.clone(),
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        };

        self.sessions
            .unbounded_send(session)
            .map_err(|_| TransportError::Connect("memory server dropped".to_string()))?;

        let sink = outbound_tx.sink_map_err(|_| TransportError::Closed);

        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(inbound_rx),
        })
    }
}

/// Server side of a [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryServer {
    sessions: mpsc::UnboundedReceiver<MemorySession>,
}

impl MemoryServer {
    /// Wait for the next accepted connection
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.sessions.next().await
    }

    /// Take an accepted connection if one is waiting
    pub fn try_accept(&mut self) -> Option<MemorySession> {
        self.sessions.next().now_or_never().flatten()
    }
}

/// Server end of one accepted socket
///
/// Dropping the session ends the client's stream, which the client sees as the
/// server going away.
#[derive(Debug)]
pub struct MemorySession {
    url: Url,
    inbound: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemorySession {
    /// URL the client connected to
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Push a frame to the client
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.push(Ok(frame))
    }

    /// Push a text frame to the client
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(Frame::Text(text.into()))
    }

    /// Push an encoded envelope to the client
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match envelope.to_json() {
            Ok(json) => self.send_text(json),
            Err(_) => false,
        }
    }

    /// Make the client's stream yield a transport error
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.push(Err(TransportError::Socket(message.into())))
    }

    /// Send a close frame and stop delivering to the client
    pub fn close(&mut self) {
        if let Some(tx) = self.inbound.take() {
            let _ = tx.unbounded_send(Ok(Frame::Close(None)));
            tx.close_channel();
        }
    }

    /// Next frame the client wrote, `None` once the client side is gone
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.next().await
    }

    /// Next text frame the client wrote, decoded as an envelope
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.recv().await? {
                Frame::Text(text) => return Envelope::from_json(&text).ok(),
                Frame::Close(_) => return None,
                _ => {}
            }
        }
    }

    fn push(&self, item: Result<Frame, TransportError>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("ws://memory.test/ws").unwrap()
    }

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let (connector, mut server) = MemoryConnector::refusing();
        connector.push_outcome(ConnectOutcome::Accept);

        assert!(connector.connect(&url()).await.is_ok());
        assert!(matches!(
            connector.connect(&url()).await,
            Err(TransportError::Connect(_))
        ));
        assert_eq!(connector.attempts(), 2);

        let session = server.try_accept().unwrap();
        assert_eq!(session.url(), &url());
        assert!(server.try_accept().is_none());
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut server) = MemoryConnector::new();
        let Transport { mut sink, mut stream } = connector.connect(&url()).await.unwrap();
        let mut session = server.accept().await.unwrap();

        let env = Envelope::new("olt_status", json!({"olt": 3}));
        assert!(session.send_envelope(&env));
        assert_eq!(stream.next().await, Some(Ok(Frame::Text(env.to_json().unwrap()))));

        sink.send(Frame::Text(Envelope::new("ack", json!(1)).to_json().unwrap()))
            .await
            .unwrap();
        let received = session.recv_envelope().await.unwrap();
        assert_eq!(received.event_type, "ack");
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (connector, mut server) = MemoryConnector::new();
        let Transport { mut sink, mut stream } = connector.connect(&url()).await.unwrap();
        let mut session = server.accept().await.unwrap();

        session.close();
        assert_eq!(stream.next().await, Some(Ok(Frame::Close(None))));
        assert!(stream.next().await.is_none());
        assert!(!session.send_text("late"));

        drop(session);
        assert!(matches!(
            sink.send(Frame::Text("x".into())).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_accept_fails_without_server() {
        let (connector, server) = MemoryConnector::new();
        drop(server);
        assert!(connector.connect(&url()).await.is_err());
    }
}
