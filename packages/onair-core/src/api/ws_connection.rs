//! WebSocket connection tracking and management.
//!
//! - `WsConnectionManager`: tracks every presenter connection and its role
//! - `ConnectionGuard`: RAII guard for automatic cleanup on disconnect

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// What a connection does besides presenting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionRole {
    Presenter,
    /// Also plays the audio.
    AudioClient,
}

struct ConnectionState {
    connected_at: Instant,
    role: ConnectionRole,
}

/// Summary of the live connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub connections: usize,
    pub audio_client: Option<String>,
    /// Age of the oldest connection, in seconds.
    pub oldest_secs: Option<u64>,
}

/// Manages all active WebSocket connections.
///
/// Uses hierarchical cancellation tokens so every connection can be
/// force-closed at once.
pub struct WsConnectionManager {
    connections: DashMap<String, ConnectionState>,
    next_id: AtomicU64,
    /// Replaced after `close_all()` so new connections can still be accepted.
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a new presenter connection.
    ///
    /// The returned guard unregisters it when dropped.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn_id = format!("ws-{}", id);
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            conn_id.clone(),
            ConnectionState {
                connected_at: Instant::now(),
                role: ConnectionRole::Presenter,
            },
        );
        log::info!(
            "[WS] Connection registered: {} (total: {})",
            conn_id,
            self.connections.len()
        );

        ConnectionGuard {
            id: conn_id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    /// Marks `id` as the audio client; any previous audio client reverts to
    /// a plain presenter.
    pub fn set_audio_client(&self, id: &str) {
        for mut entry in self.connections.iter_mut() {
            entry.role = if entry.key() == id {
                ConnectionRole::AudioClient
            } else {
                ConnectionRole::Presenter
            };
        }
    }

    #[must_use]
    pub fn role(&self, id: &str) -> Option<ConnectionRole> {
        self.connections.get(id).map(|c| c.role)
    }

    fn unregister(&self, id: &str) {
        if self.connections.remove(id).is_some() {
            log::info!(
                "[WS] Connection unregistered: {} (remaining: {})",
                id,
                self.connections.len()
            );
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        let audio_client = self
            .connections
            .iter()
            .find(|c| c.role == ConnectionRole::AudioClient)
            .map(|c| c.key().clone());
        let oldest_secs = self
            .connections
            .iter()
            .map(|c| c.connected_at.elapsed().as_secs())
            .max();
        ConnectionStats {
            connections: self.connections.len(),
            audio_client,
            oldest_secs,
        }
    }

    /// Force-closes all connections.
    ///
    /// Returns the number of connections that were signaled to close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
            let mut guard = self.global_cancel.write();
            guard.cancel();
            *guard = CancellationToken::new();
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that unregisters a connection when dropped.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    /// Cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}
