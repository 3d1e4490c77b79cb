//! Worker client runtime.
//!
//! Connects to the relay, announces its client id, then serves commands:
//! each `command` frame runs its handler in a spawned task (bounded by a
//! semaphore) and writes exactly one `response` frame back. Handlers may
//! run concurrently, so the write half sits behind a mutex to keep
//! response frames from interleaving.
//!
//! The outer [`run`] loop reconnects with a fixed delay whenever the
//! relay connection is lost, matching the original deployment behaviour.
//!
//! [`run`]: Worker::run

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::framing::{read_frame, write_frame};
use crate::protocol::{Message, Params, Response};
use uuid::Uuid;

use super::registry::HandlerRegistry;

/// A worker serving handlers to the relay.
pub struct Worker {
    config: WorkerConfig,
    registry: Arc<HandlerRegistry>,
}

impl Worker {
    /// Create a worker over the given handler registry.
    pub fn new(config: WorkerConfig, registry: HandlerRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    /// Connect and serve forever, reconnecting on any failure.
    pub async fn run(self) -> Result<()> {
        loop {
            match TcpStream::connect(&self.config.relay_addr).await {
                Ok(stream) => {
                    tracing::info!(addr = %self.config.relay_addr, "connected to relay");
                    if let Err(e) = self.serve_stream(stream).await {
                        tracing::warn!(error = %e, "relay session ended");
                    } else {
                        tracing::info!("relay disconnected");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "connection to relay failed");
                }
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Serve one connection until it closes.
    ///
    /// Generic over the stream type so tests can drive a session over an
    /// in-memory duplex pair.
    pub async fn serve_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        write_frame(
            &mut writer,
            &Message::Hello {
                client_id: self.config.client_id.clone(),
            },
        )
        .await?;

        let writer = Arc::new(Mutex::new(writer));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_handlers));

        loop {
            let msg = match read_frame(&mut reader, self.config.max_frame_len).await {
                Ok(Some(msg)) => msg,
                Ok(None) => return Ok(()),
                Err(e) => return Err(e),
            };

            match msg {
                Message::Command { id, handler, params } => {
                    let permit = semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("semaphore never closed");
                    let registry = self.registry.clone();
                    let writer = writer.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let response = execute(&registry, id, &handler, params).await;
                        let mut writer = writer.lock().await;
                        if let Err(e) = write_frame(&mut *writer, &Message::Response(response)).await
                        {
                            tracing::warn!(request_id = %id, error = %e, "failed to write response");
                        }
                    });
                }
                other => {
                    tracing::debug!(message = ?other, "ignoring non-command frame");
                }
            }
        }
    }
}

/// Run one handler and fold its outcome into a response.
async fn execute(registry: &HandlerRegistry, id: Uuid, handler: &str, params: Params) -> Response {
    match registry.dispatch(handler, params).await {
        Ok(payload) => Response::success(id, payload),
        Err(e) => {
            tracing::warn!(request_id = %id, handler, error = %e, "handler failed");
            Response::failure(id, e.to_string())
        }
    }
}
