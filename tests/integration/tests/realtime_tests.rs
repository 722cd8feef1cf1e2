//! Realtime client integration tests
//!
//! Every test starts its own WebSocket server on an ephemeral port; no
//! external services are needed.
//!
//! Run with: cargo test -p integration-tests --test realtime_tests

use std::time::Duration;

use integration_tests::{
    fast_options, wait_for_event, wait_for_status, TestWsServer, TEST_TIMEOUT, WS_PATH,
};
use isp_common::AppConfig;
use isp_realtime::{
    Channel, ChannelStream, ClientEvent, ClientOptions, ConnectionStatus, Envelope, RealtimeClient,
};
use serde_json::{json, Value};

async fn recv(stream: &mut ChannelStream) -> Value {
    tokio::time::timeout(TEST_TIMEOUT, stream.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("stream closed")
}

async fn connected_client(server: &TestWsServer) -> RealtimeClient {
    let client = RealtimeClient::new(fast_options(&server.url()).unwrap());
    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await.unwrap();
    server.wait_for_live(1).await.unwrap();
    client
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_delivers_payload_to_named_channel() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;
    let mut olt = client.subscribe_stream("olt_status");

    server
        .push(&Envelope::new("alarm", json!({"severity": "major"})))
        .unwrap();
    server
        .push(&Envelope::new("olt_status", json!({"olt": 12, "state": "down"})))
        .unwrap();

    let payload = recv(&mut olt).await;
    assert_eq!(payload, json!({"olt": 12, "state": "down"}));
    assert_eq!(
        client.last_message().map(|e| e.event_type),
        Some("olt_status".to_string())
    );
}

#[tokio::test]
async fn test_wildcard_receives_whole_envelope() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;
    let mut all = client.subscribe_stream(Channel::Wildcard);

    let envelope = Envelope::new("job_progress", json!({"job": "firmware-push", "pct": 40}));
    server.push(&envelope).unwrap();

    let value = recv(&mut all).await;
    assert_eq!(value["type"], "job_progress");
    assert_eq!(value["data"]["pct"], 40);
    assert_eq!(value["timestamp"], json!(envelope.timestamp));
}

#[tokio::test]
async fn test_malformed_frame_does_not_drop_connection() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;
    let mut alarms = client.subscribe_stream("alarm");

    server.push_text("{ this is not json").unwrap();
    server.push(&Envelope::new("alarm", json!("LOS on PON 3"))).unwrap();

    let payload = recv(&mut alarms).await;
    assert_eq!(payload, json!("LOS on PON 3"));
    assert!(client.is_connected());
    assert_eq!(server.accepted(), 1);
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_reaches_server() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;

    assert!(client.send("ack_alarm", json!({"alarm_id": 981})));

    let envelope = server.next_inbound().await.unwrap();
    assert_eq!(envelope.event_type, "ack_alarm");
    assert_eq!(envelope.data, json!({"alarm_id": 981}));
    assert!(envelope.timestamp.is_some());
}

#[tokio::test]
async fn test_send_before_connect_is_dropped() {
    let server = TestWsServer::start().await.unwrap();
    let client = RealtimeClient::new(fast_options(&server.url()).unwrap());

    assert!(!client.send("ack_alarm", json!({"alarm_id": 1})));

    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await.unwrap();
    assert!(client.send("ack_alarm", json!({"alarm_id": 2})));

    // Only the message sent while open arrives
    let envelope = server.next_inbound().await.unwrap();
    assert_eq!(envelope.data, json!({"alarm_id": 2}));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;
    let mut events = client.events();
    let mut olt = client.subscribe_stream("olt_status");

    server.close_all();

    let scheduled = wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::ReconnectScheduled { .. })
    })
    .await
    .unwrap();
    assert_eq!(
        scheduled,
        ClientEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(50)
        }
    );

    wait_for_event(&mut events, |e| {
        *e == ClientEvent::StatusChanged(ConnectionStatus::Connected)
    })
    .await
    .unwrap();
    server.wait_for_accepted(2).await.unwrap();
    server.wait_for_live(1).await.unwrap();
    assert_eq!(client.reconnect_attempts(), 0);

    // Subscriptions survive the reconnect
    server.push(&Envelope::new("olt_status", json!({"olt": 1}))).unwrap();
    let payload = recv(&mut olt).await;
    assert_eq!(payload, json!({"olt": 1}));
}

#[tokio::test]
async fn test_gives_up_when_server_is_gone() {
    let mut server = TestWsServer::start().await.unwrap();
    server.stop().await;

    let options = fast_options(&server.url())
        .unwrap()
        .reconnect_interval(Duration::from_millis(10))
        .max_reconnect_attempts(3);
    let client = RealtimeClient::new(options);
    let mut events = client.events();
    client.connect();

    let exhausted = wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::ReconnectExhausted { .. })
    })
    .await
    .unwrap();

    assert_eq!(exhausted, ClientEvent::ReconnectExhausted { attempts: 3 });
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(server.accepted(), 0);
}

#[tokio::test]
async fn test_recovers_when_server_restarts() {
    let mut server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;
    let mut events = client.events();

    server.stop().await;
    wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::ReconnectScheduled { .. })
    })
    .await
    .unwrap();

    server.restart().await.unwrap();
    wait_for_status(&client, ConnectionStatus::Connected).await.unwrap();
    server.wait_for_accepted(2).await.unwrap();
    server.wait_for_live(1).await.unwrap();
}

#[tokio::test]
async fn test_disconnect_is_final() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;

    client.disconnect();
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);
    server.wait_for_live(0).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.accepted(), 1);
    assert_eq!(server.live(), 0);
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_explicit_reconnect_opens_new_socket() {
    let server = TestWsServer::start().await.unwrap();
    let client = connected_client(&server).await;

    client.reconnect();
    wait_for_status(&client, ConnectionStatus::Connected).await.unwrap();

    server.wait_for_accepted(2).await.unwrap();
    server.wait_for_live(1).await.unwrap();
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_client_from_environment_config() {
    let server = TestWsServer::start().await.unwrap();
    let origin = server.origin();

    let config = AppConfig::from_lookup(|key| match key {
        "REALTIME_ORIGIN" => Some(origin.clone()),
        "REALTIME_WS_PATH" => Some(WS_PATH.to_string()),
        "REALTIME_RECONNECT_INTERVAL_MS" => Some("50".to_string()),
        _ => None,
    })
    .unwrap();

    let options = ClientOptions::from_config(&config.realtime).unwrap();
    assert_eq!(options.url.as_str(), server.url());
    assert!(options.auto_connect);

    // Auto-connect starts the socket on creation
    let client = RealtimeClient::new(options);
    wait_for_status(&client, ConnectionStatus::Connected).await.unwrap();
    server.wait_for_live(1).await.unwrap();
}
