//! Connection registry and the outbound event seam
//!
//! The registry maps connected users to their outbound channels. Components
//! that emit events (room engine, matchmaking) depend only on the
//! `SessionSink` trait, so tests can capture emits without sockets.

use crate::error::Result;
use crate::session::events::ServerEvent;
use crate::types::UserId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Trait for delivering server events to connected users
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Send an event to a single user. Delivering to a user with no live
    /// connection is not an error; the event is dropped.
    async fn send(&self, user_id: &UserId, event: ServerEvent) -> Result<()>;
}

/// Handle to one live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Registry of live connections keyed by user
#[derive(Debug, Default)]
pub struct SessionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, replacing any previous one (a
    /// reconnect supersedes the stale socket).
    pub fn register(
        &self,
        user_id: UserId,
        username: String,
    ) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let handle = ConnectionHandle {
            connection_id,
            user_id: user_id.clone(),
            username,
            tx,
        };

        if let Ok(mut connections) = self.connections.write() {
            connections.insert(user_id, handle);
        }

        (connection_id, rx)
    }

    /// Remove a connection, but only if it is still the registered one.
    /// A stale socket closing must not evict its replacement.
    pub fn unregister(&self, user_id: &UserId, connection_id: Uuid) -> bool {
        if let Ok(mut connections) = self.connections.write() {
            if let Some(handle) = connections.get(user_id) {
                if handle.connection_id == connection_id {
                    connections.remove(user_id);
                    return true;
                }
            }
        }
        false
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.connections
            .read()
            .map(|connections| connections.contains_key(user_id))
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionSink for SessionRegistry {
    async fn send(&self, user_id: &UserId, event: ServerEvent) -> Result<()> {
        let tx = self
            .connections
            .read()
            .ok()
            .and_then(|connections| connections.get(user_id).map(|handle| handle.tx.clone()));

        match tx {
            Some(tx) => {
                // A closed receiver means the socket task is tearing down;
                // the disconnect path will clean up the registry entry.
                let _ = tx.send(event);
            }
            None => {
                debug!("Dropping event for offline user {}", user_id);
            }
        }

        Ok(())
    }
}

/// Session sink that records every event for assertions in tests
#[derive(Debug, Default)]
pub struct MockSessionSink {
    events: std::sync::Mutex<Vec<(UserId, ServerEvent)>>,
}

impl MockSessionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All (recipient, event) pairs recorded so far
    pub fn events(&self) -> Vec<(UserId, ServerEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events delivered to one user
    pub fn events_for(&self, user_id: &UserId) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter(|(recipient, _)| recipient == user_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Count events whose wire tag matches `tag` (e.g. "matchFinished")
    pub fn count_events(&self, tag: &str) -> usize {
        self.events()
            .iter()
            .filter(|(_, event)| {
                serde_json::to_value(event)
                    .ok()
                    .and_then(|value| value.get("event").cloned())
                    .map(|value| value == tag)
                    .unwrap_or(false)
            })
            .count()
    }
}

#[async_trait]
impl SessionSink for MockSessionSink {
    async fn send(&self, user_id: &UserId, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push((user_id.clone(), event));
        }
        Ok(())
    }
}
