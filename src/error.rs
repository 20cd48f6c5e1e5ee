//! Application error types.

use thiserror::Error;

use crate::nvim::RpcError;

/// Fatal errors that end an nvr invocation.
#[derive(Error, Debug)]
pub enum NvrError {
    #[error("Can't connect to {address} and --nostart was given")]
    Unreachable { address: String },

    #[error("Unable to attach to the new nvim process. Is `{command}` working?")]
    SpawnTimeout { command: String },

    #[error("Can't start new nvim process: `{program}` is not in $PATH")]
    NotFound { program: String },

    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Remote(#[from] RpcError),

    #[error("Tag jump failed: {0}")]
    Tag(RpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
