//! End-to-end tests against local REST and stream servers.
//!
//! Run with: cargo test --test integration

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use prost::Message as _;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use mexc_depth_feed::error::SessionError;
use mexc_depth_feed::feed::proto::{AggreDepths, DepthItem, PushWrapper};
use mexc_depth_feed::feed::{ConnectionState, FeedSession, UpdateCallback, PING_CHANNEL};
use mexc_depth_feed::orderbook::{PriceLevel, Projection};

use support::{
    feed_config, serve_counted_snapshot, serve_snapshot, wait_for_state, ServerEvent, StreamServer, WAIT,
};

const SNAPSHOT: &str = r#"{"lastUpdateId":1,"asks":[["100","1"],["101","2"]],"bids":[["99","1"],["98","2"]]}"#;
const PING: &str = r#"{"method":"PING"}"#;
const PONG: &str = r#"{"method":"PONG"}"#;

fn depth_frame(asks: &[(&str, &str)], bids: &[(&str, &str)]) -> Message {
    let items = |levels: &[(&str, &str)]| {
        levels
            .iter()
            .map(|(price, quantity)| DepthItem::new(*price, *quantity))
            .collect()
    };
    let wrapper = PushWrapper {
        channel: "spot@public.aggre.depth.v3.api.pb@100ms@BTCUSDT".to_string(),
        symbol: Some("BTCUSDT".to_string()),
        aggre_depths: Some(AggreDepths {
            asks: items(asks),
            bids: items(bids),
            event_type: "spot@public.aggre.depth.v3.api.pb@100ms".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    Message::Binary(wrapper.encode_to_vec())
}

fn collector() -> (UpdateCallback, mpsc::UnboundedReceiver<Arc<Projection>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: UpdateCallback = Arc::new(move |view: Arc<Projection>| {
        let _ = tx.send(view);
    });
    (callback, rx)
}

fn level(price: rust_decimal::Decimal, quantity: rust_decimal::Decimal) -> PriceLevel {
    PriceLevel::new(price, quantity)
}

#[tokio::test]
async fn delta_after_snapshot_publishes_projection() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let mut server = StreamServer::start(vec![depth_frame(&[("100", "0"), ("102", "3")], &[])]).await;

    let mut session = FeedSession::new("btc/usdt", feed_config(&rest, &server.url), reqwest::Client::new());
    let (callback, mut updates) = collector();
    session.start(Some(callback)).unwrap();

    let subscribe = server.next_text().await;
    assert_eq!(
        subscribe,
        r#"{"method":"SUBSCRIPTION","params":["spot@public.aggre.depth.v3.api.pb@100ms@BTCUSDT"]}"#
    );

    let view = timeout(WAIT, updates.recv()).await.unwrap().unwrap();
    let expected = Projection {
        symbol: "BTCUSDT".to_string(),
        asks: vec![level(dec!(101), dec!(2)), level(dec!(102), dec!(3))],
        bids: vec![level(dec!(99), dec!(1)), level(dec!(98), dec!(2))],
    };
    assert_eq!(*view, expected);
    assert_eq!(session.latest_projection(50), Some(expected));

    session.stop().await.unwrap();
}

#[tokio::test]
async fn snapshot_is_visible_before_first_delta() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let server = StreamServer::start(vec![]).await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    let mut states = session.subscribe_state();
    let (callback, mut updates) = collector();
    session.start(Some(callback)).unwrap();
    wait_for_state(&mut states, ConnectionState::Subscribed).await;

    let view = session.latest_projection(1).unwrap();
    assert_eq!(view.asks, vec![level(dec!(100), dec!(1))]);
    assert_eq!(view.bids, vec![level(dec!(99), dec!(1))]);
    assert!(updates.try_recv().is_err());

    session.stop().await.unwrap();
}

#[tokio::test]
async fn text_and_binary_keepalives_are_acknowledged() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let binary_ping = PushWrapper {
        channel: PING_CHANNEL.to_string(),
        ..Default::default()
    };
    let mut server = StreamServer::start(vec![
        Message::Text(PING.to_string()),
        Message::Binary(binary_ping.encode_to_vec()),
    ])
    .await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    session.start(None).unwrap();

    server.next_text().await;
    assert_eq!(server.next_text().await, PONG);
    assert_eq!(server.next_text().await, PONG);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn silent_stream_reconnects_after_fixed_delay() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let server = StreamServer::start(vec![]).await;

    let mut config = feed_config(&rest, &server.url);
    config.receive_timeout = Duration::from_millis(200);
    config.reconnect_delay = Duration::from_millis(400);

    let mut session = FeedSession::new("BTCUSDT", config, reqwest::Client::new());
    let mut states = session.subscribe_state();
    session.start(None).unwrap();

    wait_for_state(&mut states, ConnectionState::Subscribed).await;
    wait_for_state(&mut states, ConnectionState::Backoff).await;
    let backoff_at = Instant::now();
    assert_eq!(server.accepts(), 1);
    assert!(session.is_running());

    wait_for_state(&mut states, ConnectionState::Subscribed).await;
    assert!(backoff_at.elapsed() >= Duration::from_millis(300));
    assert_eq!(server.accepts(), 2);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn stop_during_receive_wait_closes_connection() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let mut server = StreamServer::start(vec![]).await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    let mut states = session.subscribe_state();
    session.start(None).unwrap();
    wait_for_state(&mut states, ConnectionState::Subscribed).await;
    server.next_text().await;

    timeout(Duration::from_secs(3), session.stop())
        .await
        .expect("stop should not hang")
        .unwrap();
    assert_eq!(session.state(), ConnectionState::Stopped);
    assert!(!session.is_running());
    assert_eq!(server.next_event().await, ServerEvent::Closed);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.accepts(), 1);
}

#[tokio::test]
async fn deltas_are_dropped_without_snapshot() {
    let rest = serve_snapshot(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
    let mut server = StreamServer::start(vec![
        depth_frame(&[("100", "1")], &[("99", "1")]),
        Message::Text(PING.to_string()),
    ])
    .await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    let (callback, mut updates) = collector();
    session.start(Some(callback)).unwrap();

    server.next_text().await;
    assert_eq!(server.next_text().await, PONG);
    assert!(updates.try_recv().is_err());
    assert!(session.latest_projection(5).is_none());
    assert_eq!(session.state(), ConnectionState::Subscribed);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn emptied_side_clears_published_view() {
    let rest = serve_snapshot(StatusCode::OK, r#"{"asks":[["100","1"]],"bids":[["99","1"]]}"#).await;
    let mut server = StreamServer::start(vec![
        depth_frame(&[], &[("99", "0")]),
        Message::Text(PING.to_string()),
    ])
    .await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    let (callback, mut updates) = collector();
    session.start(Some(callback)).unwrap();

    server.next_text().await;
    assert_eq!(server.next_text().await, PONG);
    assert!(updates.try_recv().is_err());
    assert!(session.latest_projection(5).is_none());

    session.stop().await.unwrap();
}

/// First connection removes ask 100, then goes quiet until the session
/// reconnects. Returns what the reader shows once the second connection is up
/// and how many snapshots were fetched.
async fn view_after_reconnect(refresh: bool) -> (Projection, usize) {
    let (rest, hits) = serve_counted_snapshot(SNAPSHOT).await;
    let server = StreamServer::start_with(vec![vec![depth_frame(&[("100", "0")], &[])]]).await;

    let mut config = feed_config(&rest, &server.url);
    config.receive_timeout = Duration::from_millis(300);
    config.refresh_snapshot_on_reconnect = refresh;

    let mut session = FeedSession::new("BTCUSDT", config, reqwest::Client::new());
    let mut states = session.subscribe_state();
    let (callback, mut updates) = collector();
    session.start(Some(callback)).unwrap();

    let view = timeout(WAIT, updates.recv()).await.unwrap().unwrap();
    assert_eq!(view.asks, vec![level(dec!(101), dec!(2))]);

    wait_for_state(&mut states, ConnectionState::Backoff).await;
    wait_for_state(&mut states, ConnectionState::Subscribed).await;
    assert_eq!(server.accepts(), 2);

    let view = session.latest_projection(50).unwrap();
    session.stop().await.unwrap();
    (view, hits.load(Ordering::SeqCst))
}

#[tokio::test]
async fn reconnect_with_refresh_rebuilds_from_new_snapshot() {
    let (view, fetches) = view_after_reconnect(true).await;
    assert_eq!(view.asks, vec![level(dec!(100), dec!(1)), level(dec!(101), dec!(2))]);
    assert_eq!(view.bids, vec![level(dec!(99), dec!(1)), level(dec!(98), dec!(2))]);
    assert_eq!(fetches, 2);
}

#[tokio::test]
async fn reconnect_without_refresh_keeps_replica() {
    let (view, fetches) = view_after_reconnect(false).await;
    assert_eq!(view.asks, vec![level(dec!(101), dec!(2))]);
    assert_eq!(fetches, 1);
}

#[tokio::test]
async fn heartbeat_pings_do_not_hold_off_silence_timeout() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let mut server = StreamServer::start(vec![]).await;

    let mut config = feed_config(&rest, &server.url);
    config.ping_interval = Duration::from_millis(100);
    config.receive_timeout = Duration::from_millis(350);

    let mut session = FeedSession::new("BTCUSDT", config, reqwest::Client::new());
    let mut states = session.subscribe_state();
    session.start(None).unwrap();
    wait_for_state(&mut states, ConnectionState::Subscribed).await;

    let mut pings = 0;
    while pings < 2 {
        if server.next_event().await == ServerEvent::Ping {
            pings += 1;
        }
    }

    // The server answers every ping with a pong, yet the stream carries no data.
    wait_for_state(&mut states, ConnectionState::Backoff).await;
    assert_eq!(server.accepts(), 1);
    assert!(session.is_running());

    session.stop().await.unwrap();
}

#[tokio::test]
async fn panicking_callback_leaves_session_stopped() {
    let rest = serve_snapshot(StatusCode::OK, SNAPSHOT).await;
    let server = StreamServer::start(vec![depth_frame(&[("102", "1")], &[])]).await;

    let mut session = FeedSession::new("BTCUSDT", feed_config(&rest, &server.url), reqwest::Client::new());
    let mut states = session.subscribe_state();
    let callback: UpdateCallback = Arc::new(|_view: Arc<Projection>| panic!("consumer failed"));
    session.start(Some(callback)).unwrap();

    wait_for_state(&mut states, ConnectionState::Stopped).await;
    assert!(!session.is_running());

    session.stop().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn stop_before_start_is_rejected() {
    let mut session = FeedSession::new("BTCUSDT", feed_config("http://127.0.0.1:1", "ws://127.0.0.1:1"), reqwest::Client::new());
    assert!(matches!(session.stop().await, Err(SessionError::NotStarted { .. })));
}
