//! Integration tests for the connection layer
//!
//! These drive a real driver task against the scripted transport and check
//! the published viewer states and handle bookkeeping.

use super::*;
use crate::test_utils::{ConnectPlan, ScriptedConnector, wait_for};
use crate::types::{CameraRef, ConnectionState, Credential, ViewerStatus};
use crate::{FaultKind, ViewerConfig};
use futures::StreamExt;
use std::time::Duration;

fn options(connector: &ScriptedConnector, config: ViewerConfig) -> StreamOptions {
    StreamOptions::new(config).with_connector(connector.clone())
}

fn lobby() -> Option<CameraRef> {
    Some(CameraRef::new(42, "Lobby"))
}

fn token() -> Option<Credential> {
    Some(Credential::new("valid-token"))
}

#[tokio::test]
async fn camera_42_connects_waits_then_streams() {
    let _ = tracing_subscriber::fmt::try_init();

    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();

    assert_eq!(states.borrow().status, ViewerStatus::Connecting);

    let waiting = wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;
    assert_eq!(waiting.status, ViewerStatus::Connecting);
    assert!(waiting.current_frame.is_none());

    connector.feed(0).expect("feed").frame(vec![0xFF, 0xD8, 0xFF, 0xE0]);
    let streaming = wait_for(&mut states, |s| s.status == ViewerStatus::Streaming).await;
    let frame = streaming.current_frame.expect("frame");
    assert_eq!(frame.sequence, 1);
    assert!(connection.registry().is_live(frame.handle));

    assert_eq!(connector.targets(), vec!["ws://127.0.0.1:8000/ws/stream/42?token=valid-token"]);
}

#[tokio::test]
async fn missing_credential_fails_without_a_transport() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), None, &options(&connector, ViewerConfig::default()));

    let state = connection.state();
    assert_eq!(state.status, ViewerStatus::Error);
    assert_eq!(state.fault.map(|f| f.kind), Some(FaultKind::AuthMissing));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test]
async fn empty_credential_counts_as_missing() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(
        lobby(),
        Some(Credential::new("")),
        &options(&connector, ViewerConfig::default()),
    );

    let state = connection.state();
    assert_eq!(state.status, ViewerStatus::Error);
    assert_eq!(state.fault.map(|f| f.kind), Some(FaultKind::AuthMissing));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connector.attempts(), 0);
    assert!(connector.targets().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_can_read_the_connection_while_frames_arrive() {
    const FRAMES: u64 = 500;

    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    for i in 0..FRAMES {
        feed.frame(vec![0xFF, 0xD8, (i % 256) as u8]);
    }

    // the predicate reads the connection while the driver keeps publishing
    let state = wait_for(&mut states, |_| connection.state().stats.frames_received == FRAMES).await;
    assert_eq!(state.connection, ConnectionState::Open);
    assert_eq!(connection.registry().live_count(), 1);

    connection.close();
}

#[tokio::test]
async fn missing_camera_fails_without_a_transport() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(None, token(), &options(&connector, ViewerConfig::default()));

    assert_eq!(connection.connection_state(), ConnectionState::Failed);
    assert_eq!(connection.state().fault.map(|f| f.kind), Some(FaultKind::CameraMissing));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test]
async fn invalid_base_url_fails_without_a_transport() {
    let connector = ScriptedConnector::new();
    let config = ViewerConfig { base_url: "http://example.com".into(), ..ViewerConfig::default() };
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, config));

    assert_eq!(connection.state().fault.map(|f| f.kind), Some(FaultKind::InvalidTarget));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test]
async fn three_frames_leave_only_the_third_live() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.frame(b"F1".to_vec());
    feed.frame(b"F2".to_vec());
    feed.frame(b"F3".to_vec());

    let state = wait_for(&mut states, |s| s.stats.frames_received == 3).await;
    let frame = state.current_frame.expect("frame");
    let registry = connection.registry();

    assert_eq!(&frame.payload[..], b"F3");
    assert_eq!(registry.live_count(), 1);
    assert_eq!(registry.allocated_count(), 3);
    assert_eq!(registry.released_count(), 2);
    assert_eq!(registry.resolve(frame.handle).as_deref(), Some(&b"F3"[..]));
}

#[tokio::test]
async fn peer_close_while_streaming_disconnects() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.frame(b"shown".to_vec());
    let shown = wait_for(&mut states, |s| s.status == ViewerStatus::Streaming)
        .await
        .current_frame
        .expect("frame");

    feed.peer_close(1008, "Camera is inactive");
    let state = wait_for(&mut states, |s| s.status == ViewerStatus::Disconnected).await;

    assert!(state.current_frame.is_none());
    assert!(!connection.registry().is_live(shown.handle));
    let fault = state.fault.expect("fault");
    assert_eq!(fault.kind, FaultKind::PeerClosed);
    assert_eq!(fault.close_code, Some(1008));

    connection.shutdown().await;
    assert!(feed.was_closed());
}

#[tokio::test]
async fn stream_end_without_close_frame_disconnects() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    connector.feed(0).expect("feed").end();
    let state = wait_for(&mut states, |s| s.connection.is_terminal()).await;
    assert_eq!(state.status, ViewerStatus::Disconnected);
    assert_eq!(state.fault.and_then(|f| f.close_code), None);
}

#[tokio::test]
async fn transport_error_is_an_error_state() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.frame(b"frame".to_vec());
    feed.error("connection reset");

    let state = wait_for(&mut states, |s| s.connection.is_terminal()).await;
    assert_eq!(state.status, ViewerStatus::Error);
    assert_eq!(connection.registry().live_count(), 0);

    // no automatic retry
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn rejected_handshake_is_an_error_state() {
    let connector = ScriptedConnector::new();
    connector.plan(ConnectPlan::Reject("handshake rejected with HTTP 403".into()));
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();

    let state = wait_for(&mut states, |s| s.connection.is_terminal()).await;
    assert_eq!(state.status, ViewerStatus::Error);
    assert_eq!(state.fault.map(|f| f.kind), Some(FaultKind::Transport));
}

#[tokio::test]
async fn connect_timeout_is_an_error_state() {
    let connector = ScriptedConnector::new();
    connector.plan(ConnectPlan::Hang);
    let config = ViewerConfig { connect_timeout_ms: 30, ..ViewerConfig::default() };
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, config));
    let mut states = connection.subscribe();

    let state = wait_for(&mut states, |s| s.connection.is_terminal()).await;
    assert_eq!(state.fault.map(|f| f.kind), Some(FaultKind::Timeout));
}

#[tokio::test]
async fn close_during_handshake_never_opens() {
    let connector = ScriptedConnector::new();
    connector.plan(ConnectPlan::Hang);
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let states = connection.subscribe();

    connection.close();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(states.borrow().connection, ConnectionState::Closed);
    assert_eq!(connection.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn close_is_idempotent_and_nothing_resurrects() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.frame(b"frame".to_vec());
    wait_for(&mut states, |s| s.status == ViewerStatus::Streaming).await;

    connection.close();
    let once = connection.state();
    assert_eq!(once.connection, ConnectionState::Closed);
    assert_eq!(connection.registry().live_count(), 0);

    connection.close();
    assert_eq!(connection.state(), once);

    feed.frame(b"late".to_vec());
    feed.peer_close(1000, "late");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(connection.state(), once);
    assert_eq!(*states.borrow(), once);
    assert_eq!(connection.registry().allocated_count(), 1);
    assert!(feed.was_closed());
}

#[tokio::test]
async fn dropping_the_connection_releases_its_frame() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    connector.feed(0).expect("feed").frame(b"frame".to_vec());
    wait_for(&mut states, |s| s.status == ViewerStatus::Streaming).await;

    let registry = std::sync::Arc::clone(connection.registry());
    drop(connection);

    assert_eq!(registry.live_count(), 0);
    assert_eq!(states.borrow().status, ViewerStatus::Disconnected);
}

#[tokio::test]
async fn text_messages_are_ignored() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.text("{\"type\":\"hello\"}");
    feed.frame(Vec::new());
    feed.frame(b"frame".to_vec());

    let state = wait_for(&mut states, |s| s.status == ViewerStatus::Streaming).await;
    assert_eq!(state.stats.ignored_messages, 2);
    assert_eq!(state.connection, ConnectionState::Open);
}

#[tokio::test]
async fn silent_stream_trips_the_watchdog() {
    let connector = ScriptedConnector::new();
    let config = ViewerConfig { stale_after_ms: Some(40), ..ViewerConfig::default() };
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, config));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let feed = connector.feed(0).expect("feed");
    feed.frame(b"frame".to_vec());
    wait_for(&mut states, |s| s.status == ViewerStatus::Streaming).await;

    let state = wait_for(&mut states, |s| s.connection.is_terminal()).await;
    assert_eq!(state.status, ViewerStatus::Error);
    assert_eq!(state.fault.map(|f| f.kind), Some(FaultKind::Stale));
    assert_eq!(connection.registry().live_count(), 0);

    connection.shutdown().await;
    assert!(feed.was_closed());
}

#[tokio::test]
async fn updates_stream_starts_with_the_current_state() {
    let connector = ScriptedConnector::new();
    let connection = StreamConnection::open(lobby(), token(), &options(&connector, ViewerConfig::default()));
    let mut states = connection.subscribe();
    wait_for(&mut states, |s| s.connection == ConnectionState::Open).await;

    let mut updates = connection.updates();
    let first = updates.next().await.expect("state");
    assert_eq!(first.connection, ConnectionState::Open);

    connection.close();
    let last = updates.next().await.expect("state");
    assert_eq!(last.status, ViewerStatus::Disconnected);
}
