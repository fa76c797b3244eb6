//! Connection identity and the payload relayed between connections.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound side of one connection.
///
/// Lines pushed here are written to the peer by that connection's writer
/// task. The queue is bounded; a peer that stops reading has lines dropped
/// instead of growing server memory.
pub type PusherChannel = mpsc::Sender<Message>;

/// Lines queued per connection before further deliveries to it are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Unique identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh identity for a newly accepted connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, enough to tell connections apart in logs.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of text in transit, without its line terminator.
///
/// The relay never parses the payload; `"name: text"` is only a client
/// convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(String);

impl Message {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a connection handler.
///
/// Transitions only go forward: `Active` -> `Closing` -> `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandlerState {
    /// Reading and eligible for broadcast
    Active,
    /// Read failed or stream ended; cleanup in progress
    Closing,
    /// Registry entry removed and transport released
    Closed,
}

impl HandlerState {
    /// Move to `next` if it is later in the lifecycle; otherwise stay put.
    pub fn advance(self, next: HandlerState) -> HandlerState {
        self.max(next)
    }
}
