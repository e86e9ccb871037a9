//! Local stand-ins for the exchange REST API and depth stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use mexc_depth_feed::feed::ConnectionState;
use mexc_depth_feed::FeedConfig;

pub const WAIT: Duration = Duration::from_secs(5);

/// Serve a fixed depth response. Returns the REST base URL.
pub async fn serve_snapshot(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route("/api/v3/depth", get(move || async move { (status, body) }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Like [`serve_snapshot`], also counting requests.
pub async fn serve_counted_snapshot(body: &'static str) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/v3/depth",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { body }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

/// What the stream server saw on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Data frame from the client.
    Received(Message),
    /// Transport ping from the client.
    Ping,
    /// Client closed or dropped the connection.
    Closed,
}

/// Stream server that answers the first client message on each connection
/// with a fixed script and then stays silent.
pub struct StreamServer {
    pub url: String,
    accepts: Arc<AtomicUsize>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl StreamServer {
    /// Same script on every connection.
    pub async fn start(script: Vec<Message>) -> Self {
        Self::serve(move |_| script.clone()).await
    }

    /// Connection `n` gets `scripts[n]`; later connections get nothing.
    pub async fn start_with(scripts: Vec<Vec<Message>>) -> Self {
        Self::serve(move |n| scripts.get(n).cloned().unwrap_or_default()).await
    }

    async fn serve<F>(script_for: F) -> Self
    where
        F: Fn(usize) -> Vec<Message> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let accepts = Arc::new(AtomicUsize::new(0));
        let (tx, events) = mpsc::unbounded_channel();

        let counter = accepts.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script_for(counter.fetch_add(1, Ordering::SeqCst));
                let tx = tx.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    let mut greeted = false;
                    while let Some(message) = ws.next().await {
                        match message {
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(Message::Ping(_)) => {
                                let _ = tx.send(ServerEvent::Ping);
                            }
                            Ok(Message::Pong(_)) => continue,
                            Ok(message) => {
                                let _ = tx.send(ServerEvent::Received(message));
                                if !greeted {
                                    greeted = true;
                                    for frame in script.iter().cloned() {
                                        if ws.send(frame).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    let _ = tx.send(ServerEvent::Closed);
                });
            }
        });

        Self { url, accepts, events }
    }

    /// Connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub async fn next_event(&mut self) -> ServerEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("stream server stopped")
    }

    /// Next text frame sent by the client.
    pub async fn next_text(&mut self) -> String {
        loop {
            if let ServerEvent::Received(Message::Text(text)) = self.next_event().await {
                return text;
            }
        }
    }
}

/// Feed settings pointed at the local servers, with short timers.
pub fn feed_config(rest_url: &str, ws_url: &str) -> FeedConfig {
    FeedConfig {
        ws_url: ws_url.to_string(),
        rest_url: rest_url.to_string(),
        reconnect_delay: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(2),
        ..FeedConfig::default()
    }
}

/// Block until the session reports `target`.
pub async fn wait_for_state(states: &mut watch::Receiver<ConnectionState>, target: ConnectionState) {
    timeout(WAIT, async {
        while *states.borrow_and_update() != target {
            states.changed().await.expect("session dropped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {target}"));
}
