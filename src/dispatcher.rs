//! Dispatcher - the correlation engine.
//!
//! Matches outbound commands to inbound responses across many client
//! connections. Each [`send_and_wait`] call registers a waiter keyed by a
//! fresh request id, writes the command frame on the addressed client's
//! connection, and parks on a oneshot until a connection read loop calls
//! [`resolve`] with a matching response or the deadline elapses.
//!
//! Responses are matched solely by request id, never by arrival order: a
//! client may answer commands out of order and every reply still reaches
//! its own waiter.
//!
//! [`send_and_wait`]: Dispatcher::send_and_wait
//! [`resolve`]: Dispatcher::resolve

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::protocol::{Message, Params, Response};
use crate::registry::ClientRegistry;

/// Correlation engine for in-flight commands.
pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<Response>>>,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self {
            registry,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Send a command to `client_id` and wait for the matching response.
    ///
    /// At-most-once: the command is written once and never retried. The
    /// waiter entry is removed on every exit path, so a response arriving
    /// after a timeout finds no waiter and is discarded.
    ///
    /// # Errors
    ///
    /// - `ClientNotFound` if no connection is registered under
    ///   `client_id`; nothing is written in that case.
    /// - `ResponseTimeout` if no matching response arrives in time.
    /// - `Io`/`ConnectionClosed` if the command frame cannot be written.
    pub async fn send_and_wait(
        &self,
        client_id: &str,
        handler: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<Response> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        self.waiters
            .lock()
            .expect("waiter table lock poisoned")
            .insert(request_id, tx);

        let result = self
            .write_and_wait(client_id, handler, params, request_id, timeout, rx)
            .await;

        // Remove the waiter on every path. On success resolve() already
        // took the entry; on timeout or write failure this is the cleanup
        // that lets a late response fall through to the discard path.
        self.waiters
            .lock()
            .expect("waiter table lock poisoned")
            .remove(&request_id);

        result
    }

    async fn write_and_wait(
        &self,
        client_id: &str,
        handler: &str,
        params: Params,
        request_id: Uuid,
        timeout: Duration,
        rx: oneshot::Receiver<Response>,
    ) -> Result<Response> {
        let conn = self.registry.lookup(client_id)?;

        let command = Message::Command {
            id: request_id,
            handler: handler.to_string(),
            params,
        };
        // The write guard covers only the write, not the wait; concurrent
        // commands to the same client serialize here and nowhere else.
        conn.send(&command).await?;

        tracing::debug!(%request_id, client_id, handler, "command dispatched");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped without resolving; only happens if the
            // dispatcher itself is torn down.
            Ok(Err(_)) => Err(RelayError::ConnectionClosed),
            Err(_) => {
                tracing::warn!(%request_id, client_id, "response timed out");
                Err(RelayError::ResponseTimeout)
            }
        }
    }

    /// Hand an inbound response to its waiter.
    ///
    /// Called by connection read loops for every `response` frame. A
    /// response whose id has no waiter (already timed out, or spurious)
    /// is discarded silently.
    pub fn resolve(&self, response: Response) {
        let waiter = self
            .waiters
            .lock()
            .expect("waiter table lock poisoned")
            .remove(&response.id);

        match waiter {
            Some(tx) => {
                // The receiver may have been dropped between timeout and
                // cleanup; a failed send is the same as no waiter.
                let _ = tx.send(response);
            }
            None => {
                tracing::debug!(request_id = %response.id, "discarding unmatched response");
            }
        }
    }

    /// Number of in-flight commands awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.waiters.lock().expect("waiter table lock poisoned").len()
    }
}
