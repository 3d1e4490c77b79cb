//! Per-connection session loop.
//!
//! Each accepted connection runs [`run_connection`] in its own task:
//!
//! 1. Read one frame; anything but `hello` drops the connection with no
//!    side effects.
//! 2. Register the client (forcibly shutting down any superseded
//!    connection registered under the same id).
//! 3. Loop reading frames, forwarding `response` frames to the
//!    dispatcher. Other kinds are ignored.
//! 4. On end-of-stream or decode failure, unregister exactly once and
//!    return. Nothing propagates past this connection's task.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::dispatcher::Dispatcher;
use crate::error::RelayError;
use crate::framing::read_frame;
use crate::protocol::Message;
use crate::registry::{ClientConnection, ClientRegistry};

/// Run one client session to completion.
///
/// Generic over the stream type so tests can drive sessions over
/// in-memory duplex pairs.
pub async fn run_connection<S>(
    stream: S,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    max_frame_len: u32,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);

    // Handshake: the first frame must be a well-formed hello.
    let client_id = match read_frame(&mut reader, max_frame_len).await {
        Ok(Some(Message::Hello { client_id })) => client_id,
        Ok(Some(other)) => {
            tracing::warn!(kind = kind_of(&other), "first frame was not hello, dropping connection");
            return;
        }
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "handshake failed, dropping connection");
            return;
        }
    };

    let conn = Arc::new(ClientConnection::new(
        client_id.clone(),
        Box::new(writer),
    ));

    if let Some(superseded) = registry.register(conn.clone()) {
        tracing::warn!(client_id = %client_id, "replacing existing connection for client");
        superseded.shutdown().await;
    }

    read_loop(&mut reader, &dispatcher, &client_id, max_frame_len).await;

    // Unconditional on loop exit, so no registry entry outlives its
    // connection's read loop.
    registry.unregister(&conn);
}

async fn read_loop<R>(
    reader: &mut R,
    dispatcher: &Dispatcher,
    client_id: &str,
    max_frame_len: u32,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(reader, max_frame_len).await {
            Ok(Some(Message::Response(response))) => dispatcher.resolve(response),
            Ok(Some(other)) => {
                // Forward compatibility: unknown kinds, stray hellos and
                // echoed commands are all ignored.
                tracing::debug!(client_id, kind = kind_of(&other), "ignoring frame");
            }
            Ok(None) => {
                tracing::info!(client_id, "client disconnected");
                return;
            }
            Err(RelayError::MalformedFrame(reason)) => {
                tracing::warn!(client_id, %reason, "malformed frame, closing connection");
                return;
            }
            Err(e) => {
                tracing::warn!(client_id, error = %e, "read error, closing connection");
                return;
            }
        }
    }
}

fn kind_of(msg: &Message) -> &'static str {
    match msg {
        Message::Hello { .. } => "hello",
        Message::Command { .. } => "command",
        Message::Response(_) => "response",
        Message::Unknown => "unknown",
    }
}
