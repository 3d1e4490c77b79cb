//! Worker binary: connects to the relay and serves the built-in handlers.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use labwire::worker::handlers::register_builtin;
use labwire::{HandlerRegistry, Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "labwire-worker", about = "Handler worker for the labwire relay")]
struct Args {
    /// Relay address to connect to.
    #[arg(long, default_value = "127.0.0.1:9001")]
    relay_addr: String,

    /// Client id announced to the relay.
    #[arg(long, default_value = "test-client-1")]
    client_id: String,

    /// Seconds between reconnect attempts.
    #[arg(long, default_value_t = 5)]
    reconnect_delay: u64,
}

#[tokio::main]
async fn main() -> labwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = WorkerConfig::new(args.client_id);
    config.relay_addr = args.relay_addr;
    config.reconnect_delay = Duration::from_secs(args.reconnect_delay);

    let mut registry = HandlerRegistry::new();
    register_builtin(&mut registry);
    tracing::info!(handlers = ?registry.names(), "starting worker");

    Worker::new(config, registry).run().await
}
