//! Unified error types for the depth feed.

use thiserror::Error;

/// Unified error type for the depth feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Depth snapshot error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Market metadata error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Session misuse.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the one-shot REST depth snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code.
    #[error("snapshot for {symbol} returned HTTP {status}")]
    Status {
        /// Symbol requested.
        symbol: String,
        /// HTTP status code.
        status: u16,
    },

    /// Body could not be parsed.
    #[error("failed to parse snapshot: {0}")]
    Parse(String),
}

/// Errors from market metadata endpoints.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Body could not be parsed.
    #[error("failed to parse market data: {0}")]
    Parse(String),
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed by the server.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Caller misuse of a session or the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `stop()` on a session that was never started.
    #[error("session for {symbol} was never started")]
    NotStarted {
        /// Session symbol.
        symbol: String,
    },

    /// `start()` on a session that is still running.
    #[error("session for {symbol} is already running")]
    AlreadyRunning {
        /// Session symbol.
        symbol: String,
    },

    /// A session is already registered under this key.
    #[error("a session is already registered under {0}")]
    DuplicateSession(String),

    /// The feed settings cannot drive a session.
    #[error("invalid feed config: {0}")]
    InvalidConfig(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, FeedError>;
