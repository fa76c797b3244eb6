//! Error types for the relay server.

use std::io;

use thiserror::Error;

use super::ConnectionId;

/// Errors that stop the whole server.
///
/// Per-connection read failures are not represented here: they end only
/// the affected handler.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting the next connection failed
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// The bound address could not be read back from the listener
    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// A single failed delivery inside a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The recipient's writer task has already stopped
    #[error("Connection '{0}' is no longer accepting writes")]
    RecipientClosed(ConnectionId),

    /// The recipient's outbound queue is full because it stopped reading
    #[error("Connection '{0}' has a full outbound queue, message dropped")]
    RecipientBacklogged(ConnectionId),
}
