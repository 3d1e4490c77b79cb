//! Worker side: handler registry and relay client.
//!
//! A worker owns a [`HandlerRegistry`] mapping handler names to
//! implementations and a [`Worker`] runtime that keeps a connection to
//! the relay, executing commands as they arrive. The relay core stays
//! agnostic to how handlers are discovered; this module resolves them at
//! startup through explicit registration.

mod client;
pub mod handlers;
mod registry;

pub use client::Worker;
pub use registry::{BoxFuture, Handler, HandlerError, HandlerRegistry, HandlerResult};
