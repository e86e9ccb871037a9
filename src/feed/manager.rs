//! Registry of concurrent feed sessions.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use tracing::{info, warn};

use super::session::{ConnectionState, FeedSession, ProjectionReader, UpdateCallback};
use crate::config::FeedConfig;
use crate::error::SessionError;

/// Owns every running [`FeedSession`], keyed by caller-chosen ids.
#[derive(Debug)]
pub struct SessionManager<K> {
    config: FeedConfig,
    http: reqwest::Client,
    sessions: HashMap<K, FeedSession>,
}

impl<K> SessionManager<K>
where
    K: Eq + Hash + Clone + Display,
{
    /// Create an empty manager. Every session gets a copy of `config`.
    pub fn new(config: FeedConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            sessions: HashMap::new(),
        }
    }

    /// Start a session under a new key.
    pub fn start(
        &mut self,
        key: K,
        symbol: &str,
        on_update: Option<UpdateCallback>,
    ) -> Result<ProjectionReader, SessionError> {
        if self.sessions.contains_key(&key) {
            return Err(SessionError::DuplicateSession(key.to_string()));
        }

        let mut session = FeedSession::new(symbol, self.config.clone(), self.http.clone());
        session.start(on_update)?;
        let reader = session.reader();
        info!(key = %key, symbol = %session.symbol(), "Session registered");
        self.sessions.insert(key, session);
        Ok(reader)
    }

    /// Stop whatever runs under `key`, then start a new session there.
    pub async fn replace(
        &mut self,
        key: K,
        symbol: &str,
        on_update: Option<UpdateCallback>,
    ) -> Result<ProjectionReader, SessionError> {
        self.cancel(&key).await;
        self.start(key, symbol, on_update)
    }

    /// Unregister a session without stopping it.
    ///
    /// Lets callers that share the manager behind a lock stop the session
    /// after releasing it.
    pub fn remove(&mut self, key: &K) -> Option<FeedSession> {
        let session = self.sessions.remove(key)?;
        info!(key = %key, symbol = %session.symbol(), "Session unregistered");
        Some(session)
    }

    /// Stop and remove a session. Returns `false` for unknown keys.
    pub async fn cancel(&mut self, key: &K) -> bool {
        let Some(mut session) = self.sessions.remove(key) else {
            return false;
        };
        if let Err(e) = session.stop().await {
            warn!(key = %key, error = %e, "Failed to stop session");
        }
        info!(key = %key, symbol = %session.symbol(), "Session cancelled");
        true
    }

    /// Stop every session.
    pub async fn shutdown(&mut self) {
        for (key, mut session) in self.sessions.drain() {
            if let Err(e) = session.stop().await {
                warn!(key = %key, error = %e, "Failed to stop session");
            }
        }
    }

    /// Poll handle for a session.
    pub fn reader(&self, key: &K) -> Option<ProjectionReader> {
        self.sessions.get(key).map(FeedSession::reader)
    }

    /// Connection state of a session.
    pub fn state(&self, key: &K) -> Option<ConnectionState> {
        self.sessions.get(key).map(FeedSession::state)
    }

    /// Symbol a session tracks.
    pub fn symbol(&self, key: &K) -> Option<&str> {
        self.sessions.get(key).map(FeedSession::symbol)
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.sessions.keys().cloned().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether any session is currently subscribed.
    pub fn any_subscribed(&self) -> bool {
        self.sessions
            .values()
            .any(|s| s.state() == ConnectionState::Subscribed)
    }
}
