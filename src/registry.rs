//! Client registry - bookkeeping for live worker connections.
//!
//! Maps a client id to its [`ClientConnection`]. The map lock is held only
//! for the duration of the map access, never across I/O; slow clients can
//! never stall registry operations for other callers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{RelayError, Result};
use crate::framing::write_frame;
use crate::protocol::Message;

/// Boxed write half of a client's stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live worker connection.
///
/// The write half is wrapped in an async mutex: multiple gateway calls may
/// target the same client concurrently, and the guard keeps their frames
/// from interleaving. Reads are never concurrent (one read loop per
/// connection) so only writes need serializing.
pub struct ClientConnection {
    client_id: String,
    writer: tokio::sync::Mutex<BoxedWriter>,
}

impl ClientConnection {
    /// Wrap the write half of an accepted connection.
    pub fn new(client_id: impl Into<String>, writer: BoxedWriter) -> Self {
        Self {
            client_id: client_id.into(),
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    /// The id this connection registered under.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Write one framed message, holding the write guard for the duration
    /// of the write only.
    pub async fn send(&self, msg: &Message) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, msg).await
    }

    /// Shut down the write half.
    ///
    /// Used to evict a superseded connection: the peer sees the stream
    /// end and closes, and the stale session's read loop exits through
    /// its own unregister path.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Concurrent map of client id to live connection.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the entry for the connection's client id.
    ///
    /// Returns the superseded connection if one was registered under the
    /// same id; the caller decides how to dispose of it (the connection
    /// handler shuts it down so the stale read loop exits).
    pub fn register(&self, conn: Arc<ClientConnection>) -> Option<Arc<ClientConnection>> {
        let replaced = self
            .clients
            .lock()
            .expect("registry lock poisoned")
            .insert(conn.client_id().to_string(), conn.clone());
        tracing::info!(client_id = %conn.client_id(), "client registered");
        replaced
    }

    /// Remove the entry for `conn` if it is still the registered one.
    ///
    /// A superseded connection's cleanup must not evict its replacement,
    /// so the entry is only removed when it is this exact connection.
    /// Idempotent.
    pub fn unregister(&self, conn: &Arc<ClientConnection>) {
        let mut clients = self.clients.lock().expect("registry lock poisoned");
        if let Some(current) = clients.get(conn.client_id()) {
            if Arc::ptr_eq(current, conn) {
                clients.remove(conn.client_id());
                drop(clients);
                tracing::info!(client_id = %conn.client_id(), "client unregistered");
            }
        }
    }

    /// Look up a client's connection.
    pub fn lookup(&self, client_id: &str) -> Result<Arc<ClientConnection>> {
        self.clients
            .lock()
            .expect("registry lock poisoned")
            .get(client_id)
            .cloned()
            .ok_or_else(|| RelayError::ClientNotFound(client_id.to_string()))
    }

    /// Ids of all currently registered clients.
    pub fn client_ids(&self) -> Vec<String> {
        self.clients
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.lock().expect("registry lock poisoned").len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
