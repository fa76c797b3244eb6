//! Error types for the terminal client.

use std::io;

use rustyline::error::ReadlineError;
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open the stream to the server
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The server closed the stream or a write failed
    #[error("Connection lost")]
    ConnectionLost,

    /// Terminal input could not be read
    #[error("Input error: {0}")]
    Input(#[from] ReadlineError),
}
