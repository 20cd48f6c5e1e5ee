//! Neovim client for IPC communication.
//!
//! Provides a minimal client for communicating with Neovim via Unix socket
//! or TCP using msgpack-RPC.
//!
//! # Architecture
//!
//! - `Rpc`: transport seam (requests, notifications, notification stream)
//! - `NvimClient`: the msgpack-RPC implementation of `Rpc`
//! - `NvimApi`: editor operations built on any `Rpc`

mod api;
mod client;
#[cfg(test)]
pub(crate) mod testing;

use std::ops::ControlFlow;

use rmpv::Value;
use thiserror::Error;

pub use api::NvimApi;
pub use client::{NvimClient, Transport};

/// Error codes the batch may step over instead of aborting.
///
/// E37: no write since last change. E139: file is loaded in another buffer.
const BENIGN_ERRORS: &[&str] = &["E37:", "E139:"];

/// Errors from the RPC channel.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("connection closed by nvim")]
    Closed,

    #[error("{message}")]
    Remote { message: String },
}

impl RpcError {
    /// Build a remote error from the `[type, message]` error tuple.
    pub fn from_remote(error: Value) -> Self {
        let message = match &error {
            Value::Array(parts) => parts
                .get(1)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            Value::String(s) => s.as_str().map(str::to_string).unwrap_or_default(),
            other => other.to_string(),
        };
        Self::Remote { message }
    }

    /// Whether this is an editor error the batch can continue past.
    pub fn is_benign(&self) -> bool {
        match self {
            Self::Remote { message } => BENIGN_ERRORS.iter().any(|code| message.contains(code)),
            _ => false,
        }
    }
}

/// An asynchronous event pushed by the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub args: Vec<Value>,
}

/// A bidirectional request/response + notification channel to one editor.
pub trait Rpc {
    /// Synchronous request. Blocks until the matching response arrives.
    fn call(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RpcError>;

    /// One-way message, no response expected.
    fn notify(&mut self, method: &str, args: Vec<Value>) -> Result<(), RpcError>;

    /// Block until the editor sends a notification.
    fn next_notification(&mut self) -> Result<Notification, RpcError>;

    /// The channel id the editor assigned to this connection.
    fn channel_id(&mut self) -> Result<i64, RpcError>;

    /// Dispatch notifications until the handler breaks out of the loop.
    ///
    /// A transport error ends the loop through `on_error` instead.
    fn run_loop<T, F, E>(&mut self, mut on_notification: F, on_error: E) -> T
    where
        Self: Sized,
        F: FnMut(&Notification) -> ControlFlow<T>,
        E: FnOnce(RpcError) -> T,
    {
        loop {
            match self.next_notification() {
                Ok(notification) => {
                    if let ControlFlow::Break(value) = on_notification(&notification) {
                        return value;
                    }
                }
                Err(e) => return on_error(e),
            }
        }
    }
}
