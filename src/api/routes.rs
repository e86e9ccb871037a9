//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{book, delete_session, health, list_sessions, metrics, put_session, ready, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Sessions
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/sessions/:id", axum::routing::put(put_session).delete(delete_session))
        .route("/api/v1/sessions/:id/book", get(book))
        // Metrics
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::SessionSummary;
    use crate::config::FeedConfig;
    use crate::feed::SessionManager;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = FeedConfig {
            ws_url: "ws://127.0.0.1:1/ws".to_string(),
            rest_url: "http://127.0.0.1:1".to_string(),
            reconnect_delay: Duration::from_millis(50),
            ..FeedConfig::default()
        };
        AppState::new(SessionManager::new(config, reqwest::Client::new()), None, 5)
    }

    fn put(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = create_router(state()).oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_without_subscribed_sessions() {
        let response = create_router(state()).oneshot(get_req("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn put_then_list_sessions() {
        let state = state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":"btc/usdt"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: SessionSummary = body_json(response).await;
        assert_eq!(created.id, "alice");
        assert_eq!(created.symbol, "BTCUSDT");

        let response = app.oneshot(get_req("/api/v1/sessions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<SessionSummary> = body_json(response).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].symbol, "BTCUSDT");

        state.sessions.lock().await.shutdown().await;
    }

    #[tokio::test]
    async fn put_rejects_blank_symbol() {
        let response = create_router(state())
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":" / "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn book_is_404_for_unknown_and_503_without_data() {
        let state = state();
        let app = create_router(state.clone());

        let response = app.clone().oneshot(get_req("/api/v1/sessions/nobody/book")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.clone()
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":"BTCUSDT"}"#))
            .await
            .unwrap();
        let response = app
            .oneshot(get_req("/api/v1/sessions/alice/book?depth=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.sessions.lock().await.shutdown().await;
    }

    #[tokio::test]
    async fn delete_session_then_404() {
        let app = create_router(state());
        app.clone()
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":"BTCUSDT"}"#))
            .await
            .unwrap();

        let delete = || Request::builder().method("DELETE").uri("/api/v1/sessions/alice").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn second_put_replaces_session() {
        let state = state();
        let app = create_router(state.clone());

        app.clone()
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":"BTCUSDT"}"#))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(put("/api/v1/sessions/alice", r#"{"symbol":"eth/usdt"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let replaced: SessionSummary = body_json(response).await;
        assert_eq!(replaced.symbol, "ETHUSDT");

        let listed: Vec<SessionSummary> = body_json(app.oneshot(get_req("/api/v1/sessions")).await.unwrap()).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].symbol, "ETHUSDT");

        state.sessions.lock().await.shutdown().await;
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_unavailable() {
        let response = create_router(state()).oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
