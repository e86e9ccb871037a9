//! Stream session for one symbol.
//!
//! Lifecycle:
//! - `FetchingSnapshot`: one REST snapshot seeds the replica
//! - `Connecting`: connect and subscribe to the depth topic
//! - `Subscribed`: receive loop, keepalive acks, transport pings
//! - `Backoff`: fixed delay, then back to `Connecting`
//! - `Stopped`: terminal, reached only through `stop()`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::decoder::{ControlMessage, FrameDecoder, RawFrame, UpdateFrame};
use super::snapshot::SnapshotLoader;
use crate::config::FeedConfig;
use crate::error::{SessionError, WsError};
use crate::market::normalize_symbol;
use crate::metrics;
use crate::orderbook::{BookReplica, PriceLevel, Projection};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on any single outbound write, close handshake included.
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Observer invoked with every projection published after a delta.
pub type UpdateCallback = Arc<dyn Fn(Arc<Projection>) + Send + Sync>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, not started.
    Disconnected,
    /// Waiting on the REST snapshot.
    FetchingSnapshot,
    /// Opening the stream.
    Connecting,
    /// Subscribed and receiving.
    Subscribed,
    /// Waiting before the next connect attempt.
    Backoff,
    /// Shut down.
    Stopped,
}

/// Cheap handle for polling the latest projection.
#[derive(Debug, Clone)]
pub struct ProjectionReader {
    slot: Arc<ArcSwapOption<Projection>>,
}

impl ProjectionReader {
    /// Latest full projection, or `None` when there is no data.
    pub fn latest(&self) -> Option<Arc<Projection>> {
        self.slot.load_full()
    }

    /// Latest projection cut to `depth` levels per side.
    pub fn latest_projection(&self, depth: usize) -> Option<Projection> {
        self.latest().and_then(|view| view.truncated(depth))
    }
}

/// Order book feed for a single symbol.
///
/// The replica lives inside a background task. Consumers read published
/// projections through [`ProjectionReader`] or an [`UpdateCallback`].
pub struct FeedSession {
    symbol: String,
    config: FeedConfig,
    http: reqwest::Client,
    slot: Arc<ArcSwapOption<Projection>>,
    state: Arc<watch::Sender<ConnectionState>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl FeedSession {
    /// Create a session. The symbol is normalized ("btc/usdt" -> "BTCUSDT").
    pub fn new(symbol: &str, config: FeedConfig, http: reqwest::Client) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            symbol: normalize_symbol(symbol),
            config,
            http,
            slot: Arc::new(ArcSwapOption::empty()),
            state: Arc::new(state),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            task: None,
            started: false,
        }
    }

    /// Normalized symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Poll handle that stays valid after the session stops.
    pub fn reader(&self) -> ProjectionReader {
        ProjectionReader {
            slot: self.slot.clone(),
        }
    }

    /// Latest projection cut to `depth` levels per side.
    pub fn latest_projection(&self, depth: usize) -> Option<Projection> {
        self.reader().latest_projection(depth)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Whether the background task is supposed to be running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the background task and return immediately.
    ///
    /// Must be called from within a Tokio runtime. Fails without spawning
    /// anything when the feed config has a zero timer or depth.
    pub fn start(&mut self, on_update: Option<UpdateCallback>) -> Result<(), SessionError> {
        if self.task.is_some() {
            return Err(SessionError::AlreadyRunning {
                symbol: self.symbol.clone(),
            });
        }
        self.config.validate().map_err(SessionError::InvalidConfig)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.slot.store(None);
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            symbol: self.symbol.clone(),
            snapshots: SnapshotLoader::new(self.http.clone(), &self.config.rest_url),
            config: self.config.clone(),
            decoder: FrameDecoder::new(),
            replica: BookReplica::new(self.symbol.clone()),
            slot: self.slot.clone(),
            state: self.state.clone(),
            running: self.running.clone(),
            on_update,
        };

        self.task = Some(tokio::spawn(worker.run(shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        self.started = true;
        info!(symbol = %self.symbol, "Feed session started");
        Ok(())
    }

    /// Stop the session and wait until the connection is closed.
    ///
    /// Idempotent. Fails only when the session was never started.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted {
                symbol: self.symbol.clone(),
            });
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(symbol = %self.symbol, error = %e, "Feed session task failed");
            }
            info!(symbol = %self.symbol, "Feed session stopped");
        }

        self.state.send_replace(ConnectionState::Stopped);
        Ok(())
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
    }
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("symbol", &self.symbol)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Why a receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Shutdown,
    Reconnect,
}

/// Resolves once shutdown is requested or the session handle is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Marks the session stopped however the worker exits, unwinding included.
struct StopOnExit {
    symbol: String,
    state: Arc<watch::Sender<ConnectionState>>,
    running: Arc<AtomicBool>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let previous = self.state.send_replace(ConnectionState::Stopped);
        if std::thread::panicking() {
            error!(symbol = %self.symbol, state = %previous, "Feed session task panicked");
        } else if previous != ConnectionState::Stopped {
            info!(symbol = %self.symbol, from = %previous, to = %ConnectionState::Stopped, "Connection state changed");
        }
    }
}

/// Write one message, giving up after [`SEND_TIMEOUT`].
async fn send_bounded(ws: &mut WsStream, message: Message) -> Result<(), WsError> {
    timeout(SEND_TIMEOUT, ws.send(message))
        .await
        .map_err(|_| WsError::SendFailed(format!("timed out after {}ms", SEND_TIMEOUT.as_millis())))?
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

/// Task-side state. Sole owner of the replica and the connection.
struct Worker {
    symbol: String,
    config: FeedConfig,
    snapshots: SnapshotLoader,
    decoder: FrameDecoder,
    replica: BookReplica,
    slot: Arc<ArcSwapOption<Projection>>,
    state: Arc<watch::Sender<ConnectionState>>,
    running: Arc<AtomicBool>,
    on_update: Option<UpdateCallback>,
}

impl Worker {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let _stop_on_exit = StopOnExit {
            symbol: self.symbol.clone(),
            state: self.state.clone(),
            running: self.running.clone(),
        };

        self.set_state(ConnectionState::FetchingSnapshot);
        let mut proceed = self.load_snapshot(&mut shutdown).await;

        while proceed && self.running.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(ws) => {
                    self.set_state(ConnectionState::Subscribed);
                    if self.receive_loop(ws, &mut shutdown).await == LoopExit::Shutdown {
                        break;
                    }
                }
                Err(e) => warn!(symbol = %self.symbol, error = %e, "Connection attempt failed"),
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.set_state(ConnectionState::Backoff);
            metrics::inc_ws_reconnects();
            info!(
                symbol = %self.symbol,
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "Reconnecting after delay"
            );
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = sleep(self.config.reconnect_delay) => {}
            }

            if self.config.refresh_snapshot_on_reconnect {
                self.set_state(ConnectionState::FetchingSnapshot);
                proceed = self.load_snapshot(&mut shutdown).await;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(symbol = %self.symbol, from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Returns `false` when shutdown was requested during the fetch.
    ///
    /// A failed fetch leaves the replica as it was and the session goes on.
    async fn load_snapshot(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let fetched = tokio::select! {
            _ = shutdown_requested(shutdown) => return false,
            result = self.snapshots.fetch(&self.symbol, self.config.snapshot_limit) => result,
        };

        if let Ok(snapshot) = fetched {
            self.replica.load_snapshot(snapshot.asks, snapshot.bids);
            let view = self.replica.project(self.config.projection_depth).map(Arc::new);
            self.slot.store(view);
        }
        true
    }

    async fn connect(&self) -> Result<WsStream, WsError> {
        let url = self.config.ws_url.as_str();
        debug!(symbol = %self.symbol, url = %url, "Connecting to stream");

        let (mut ws, _) = timeout(self.config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                WsError::ConnectionFailed(format!(
                    "timed out after {}ms",
                    self.config.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let topic = self.config.depth_topic(&self.symbol);
        let request = serde_json::to_string(&ControlMessage::subscribe(vec![topic.clone()]))
            .map_err(|e| WsError::SendFailed(e.to_string()))?;
        send_bounded(&mut ws, Message::Text(request)).await?;

        info!(symbol = %self.symbol, topic = %topic, "Subscribed to depth stream");
        Ok(ws)
    }

    async fn receive_loop(&mut self, mut ws: WsStream, shutdown: &mut watch::Receiver<bool>) -> LoopExit {
        let silence = self.config.receive_timeout;
        let mut deadline = Instant::now() + silence;
        let mut heartbeat = interval_at(Instant::now() + self.config.ping_interval, self.config.ping_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => break LoopExit::Shutdown,
                _ = sleep_until(deadline) => {
                    warn!(symbol = %self.symbol, timeout_s = silence.as_secs_f64(), "No data received, reconnecting");
                    break LoopExit::Reconnect;
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = send_bounded(&mut ws, Message::Ping(Vec::new())).await {
                        warn!(symbol = %self.symbol, error = %e, "Failed to send ping");
                        break LoopExit::Reconnect;
                    }
                }
                message = ws.next() => {
                    let handled = match message {
                        Some(Ok(Message::Binary(bytes))) => {
                            deadline = Instant::now() + silence;
                            self.handle_frame(&mut ws, RawFrame::Binary(&bytes)).await
                        }
                        Some(Ok(Message::Text(text))) => {
                            deadline = Instant::now() + silence;
                            self.handle_frame(&mut ws, RawFrame::Text(&text)).await
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => Ok(()),
                        Some(Ok(Message::Close(frame))) => Err(WsError::ConnectionClosed {
                            code: frame.as_ref().map(|f| u16::from(f.code)),
                            reason: frame.map(|f| f.reason.into_owned()).unwrap_or_default(),
                        }),
                        Some(Err(e)) => Err(WsError::Tungstenite(e)),
                        None => Err(WsError::ConnectionClosed {
                            code: None,
                            reason: "stream ended".to_string(),
                        }),
                    };

                    if let Err(e) = handled {
                        warn!(symbol = %self.symbol, error = %e, "Stream interrupted, reconnecting");
                        break LoopExit::Reconnect;
                    }
                }
            }
        };

        if timeout(SEND_TIMEOUT, ws.close(None)).await.is_err() {
            debug!(symbol = %self.symbol, "Close handshake timed out");
        }
        exit
    }

    async fn handle_frame(&mut self, ws: &mut WsStream, raw: RawFrame<'_>) -> Result<(), WsError> {
        metrics::inc_ws_frames_received();

        match self.decoder.decode(raw) {
            UpdateFrame::DepthUpdate { asks, bids } => self.apply_depth(&asks, &bids),
            UpdateFrame::Keepalive => {
                let pong = serde_json::to_string(&ControlMessage::pong())
                    .map_err(|e| WsError::SendFailed(e.to_string()))?;
                send_bounded(ws, Message::Text(pong)).await?;
                metrics::inc_keepalives_answered();
                debug!(symbol = %self.symbol, "Keepalive answered");
            }
            UpdateFrame::Unrecognized => metrics::inc_ws_frames_unrecognized(),
        }
        Ok(())
    }

    fn apply_depth(&mut self, asks: &[PriceLevel], bids: &[PriceLevel]) {
        let _timer = metrics::timer_depth_apply();

        if !self.replica.apply_update(asks, bids) {
            metrics::inc_deltas_dropped();
            debug!(symbol = %self.symbol, "Delta dropped, no snapshot loaded");
            return;
        }
        metrics::inc_deltas_applied();

        match self.replica.project(self.config.projection_depth) {
            Some(view) => {
                let view = Arc::new(view);
                self.slot.store(Some(view.clone()));
                if let Some(on_update) = &self.on_update {
                    on_update(view);
                }
            }
            None => self.slot.store(None),
        }
    }
}
