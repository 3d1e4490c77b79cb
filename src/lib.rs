//! # labwire
//!
//! A relay that dispatches named commands to persistently-connected
//! worker clients and returns each client's reply to a separate,
//! synchronous HTTP caller.
//!
//! ## Architecture
//!
//! - **TCP side**: workers connect, send a `hello` frame with their
//!   client id, and stay connected. One session task per connection.
//! - **Correlation**: the [`Dispatcher`] assigns a unique request id to
//!   every outbound command and parks the caller until the matching
//!   `response` frame arrives or a timeout elapses.
//! - **HTTP side**: the gateway turns `GET /data` requests into commands
//!   and relays the reply body back.
//!
//! Every message on the wire is a 4-byte big-endian length prefix
//! followed by UTF-8 JSON (see [`framing`]).
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use labwire::{ClientRegistry, Dispatcher, RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> labwire::Result<()> {
//!     let config = RelayConfig::default();
//!     let registry = Arc::new(ClientRegistry::new());
//!     let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
//!
//!     let server = RelayServer::bind(
//!         config.tcp_addr,
//!         registry,
//!         dispatcher.clone(),
//!         config.max_frame_len,
//!     )
//!     .await?;
//!     tokio::spawn(server.run());
//!
//!     let state = labwire::gateway::GatewayState {
//!         dispatcher,
//!         request_timeout: config.request_timeout,
//!     };
//!     labwire::gateway::serve(config.http_addr, state).await
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod worker;

pub use config::{RelayConfig, WorkerConfig};
pub use dispatcher::Dispatcher;
pub use error::{RelayError, Result};
pub use protocol::{Message, Params, Response, Status};
pub use registry::{ClientConnection, ClientRegistry};
pub use server::RelayServer;
pub use worker::{HandlerRegistry, Worker};
