//! Line relay server library.
//!
//! Clients connect over TCP, send newline-terminated text and receive every
//! line sent by every other connected client. The server never echoes a
//! line back to its sender and never inspects the payload.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;

pub mod config;

pub use config::ServerConfig;
pub use ui::Server;
