//! HTTP API handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::feed::{ConnectionState, FeedSession, SessionManager};
use crate::market::normalize_symbol;

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Running sessions keyed by client-chosen id.
    pub sessions: Arc<Mutex<SessionManager<String>>>,
    /// Prometheus scrape handle, when the recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Levels per side returned when a book request names no depth.
    pub default_depth: usize,
}

impl AppState {
    /// Create new app state around a session manager.
    pub fn new(sessions: SessionManager<String>, metrics: Option<PrometheusHandle>, default_depth: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions)),
            metrics,
            default_depth,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether any session is subscribed.
    pub ready: bool,
    /// Number of registered sessions.
    pub sessions: usize,
}

/// One registered session.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Normalized symbol.
    pub symbol: String,
    /// Connection state.
    pub state: String,
}

/// Body of `PUT /api/v1/sessions/:id`.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Symbol to track, in any common spelling ("btc/usdt").
    pub symbol: String,
}

/// Query of `GET /api/v1/sessions/:id/book`.
#[derive(Debug, Deserialize)]
pub struct BookQuery {
    /// Levels per side.
    pub depth: Option<usize>,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - 200 once any session is subscribed, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.lock().await;
    let response = ReadyResponse {
        ready: sessions.any_subscribed(),
        sessions: sessions.len(),
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// List sessions sorted by id.
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.lock().await;
    let mut summaries: Vec<SessionSummary> = sessions
        .keys()
        .into_iter()
        .filter_map(|id| summarize(&sessions, id))
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Json(summaries)
}

fn summarize(sessions: &SessionManager<String>, id: String) -> Option<SessionSummary> {
    let symbol = sessions.symbol(&id)?.to_string();
    let state = sessions.state(&id).unwrap_or(ConnectionState::Disconnected);
    Some(SessionSummary {
        id,
        symbol,
        state: state.to_string(),
    })
}

/// Start or replace the session under `id`.
pub async fn put_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SessionRequest>,
) -> Response {
    if normalize_symbol(&request.symbol).is_empty() {
        return error(StatusCode::BAD_REQUEST, "symbol must not be empty");
    }

    let previous = state.sessions.lock().await.remove(&id);
    if let Some(previous) = previous {
        stop_detached(&id, previous).await;
    }

    let mut sessions = state.sessions.lock().await;
    if let Err(e) = sessions.start(id.clone(), &request.symbol, None) {
        let status = match e {
            SessionError::DuplicateSession(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        return error(status, e.to_string());
    }
    info!(id = %id, symbol = %request.symbol, "Session replaced via API");

    match summarize(&sessions, id) {
        Some(summary) => (StatusCode::OK, Json(summary)).into_response(),
        None => error(StatusCode::INTERNAL_SERVER_ERROR, "session vanished after start"),
    }
}

/// Stop and remove the session under `id`.
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let removed = state.sessions.lock().await.remove(&id);
    match removed {
        Some(session) => {
            stop_detached(&id, session).await;
            StatusCode::NO_CONTENT.into_response()
        }
        None => error(StatusCode::NOT_FOUND, format!("no session {id}")),
    }
}

/// Stop a session already taken out of the manager. Runs without the lock.
async fn stop_detached(id: &str, mut session: FeedSession) {
    if let Err(e) = session.stop().await {
        warn!(id = %id, error = %e, "Failed to stop session");
    }
    info!(id = %id, symbol = %session.symbol(), "Session stopped via API");
}

/// Latest projection of a session.
pub async fn book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BookQuery>,
) -> Response {
    let Some(reader) = state.sessions.lock().await.reader(&id) else {
        return error(StatusCode::NOT_FOUND, format!("no session {id}"));
    };

    let depth = query.depth.unwrap_or(state.default_depth);
    match reader.latest_projection(depth) {
        Some(view) => Json(view).into_response(),
        None => error(StatusCode::SERVICE_UNAVAILABLE, "no order book data yet"),
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => error(StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed"),
    }
}
