//! Shared utilities for the Linecast server and client.

pub mod logger;
pub mod protocol;
pub mod time;
