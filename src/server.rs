//! TCP accept loop for worker connections.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::connection::run_connection;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::registry::ClientRegistry;

/// Always-on listener accepting worker connections.
///
/// Each accepted connection gets its own task running the session loop;
/// a failing session never affects the listener or other sessions.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    max_frame_len: u32,
}

impl RelayServer {
    /// Bind the listener.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<ClientRegistry>,
        dispatcher: Arc<Dispatcher>,
        max_frame_len: u32,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "relay TCP server listening");
        Ok(Self {
            listener,
            registry,
            dispatcher,
            max_frame_len,
        })
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::debug!(%peer, "accepted connection");

            let registry = self.registry.clone();
            let dispatcher = self.dispatcher.clone();
            let max_frame_len = self.max_frame_len;
            tokio::spawn(async move {
                run_connection(stream, registry, dispatcher, max_frame_len).await;
                tracing::debug!(%peer, "session ended");
            });
        }
    }
}
