//! Relay binary: TCP listener for workers + HTTP gateway for callers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use labwire::gateway::{self, GatewayState};
use labwire::{ClientRegistry, Dispatcher, RelayConfig, RelayServer};

#[derive(Parser, Debug)]
#[command(name = "labwire-relay", about = "Command relay for labwire workers")]
struct Args {
    /// Address the TCP listener binds for worker connections.
    #[arg(long, default_value = labwire::config::DEFAULT_TCP_ADDR)]
    tcp_addr: SocketAddr,

    /// Address the HTTP gateway binds.
    #[arg(long, default_value = labwire::config::DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,

    /// Seconds a gateway call waits for a worker's response.
    #[arg(long, default_value_t = 10)]
    request_timeout: u64,

    /// Maximum accepted frame body size in bytes.
    #[arg(long, default_value_t = labwire::framing::DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: u32,
}

#[tokio::main]
async fn main() -> labwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = RelayConfig {
        tcp_addr: args.tcp_addr,
        http_addr: args.http_addr,
        request_timeout: Duration::from_secs(args.request_timeout),
        max_frame_len: args.max_frame_len,
    };

    let registry = Arc::new(ClientRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));

    let server = RelayServer::bind(
        config.tcp_addr,
        registry,
        dispatcher.clone(),
        config.max_frame_len,
    )
    .await?;
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "TCP server exited");
        }
    });

    let state = GatewayState {
        dispatcher,
        request_timeout: config.request_timeout,
    };
    gateway::serve(config.http_addr, state).await
}
