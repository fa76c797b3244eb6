//! Relay server: acceptor loop and per-connection handlers.

pub mod handler;
mod server;
mod signal;

pub use handler::{ConnectionHandler, ExitReason};
pub use server::Server;
