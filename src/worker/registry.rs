//! Handler registry for the worker side.
//!
//! Maps a handler name to a boxed implementation. The relay core never
//! executes handler logic itself; it only transports the name and
//! parameter set here, and relays back whatever the handler reports.
//! Handler failures become failure responses, never transport errors.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::Params;

/// A handler's own execution error.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result type for handler invocations.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named unit of work a worker can execute.
pub trait Handler: Send + Sync + 'static {
    /// Execute with the command's parameter set.
    fn call(&self, params: Params) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper turning an async closure into a [`Handler`].
struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Params) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.0)(params))
    }
}

/// Registry mapping handler names to implementations.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure under `name`.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(name.to_string(), Box::new(FnHandler(handler)));
    }

    /// Register a boxed handler under `name`.
    pub fn register_boxed(&mut self, name: &str, handler: Box<dyn Handler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Names of all registered handlers.
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the named handler.
    ///
    /// An unknown name is a handler-level failure, reported back to the
    /// relay inside a normal response.
    pub async fn dispatch(&self, name: &str, params: Params) -> HandlerResult {
        match self.handlers.get(name) {
            Some(handler) => handler.call(params).await,
            None => Err(HandlerError::new(format!("no handler named '{}'", name))),
        }
    }
}
