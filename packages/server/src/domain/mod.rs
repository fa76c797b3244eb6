//! Domain layer: connection identity, messages, the registry seam and errors.

mod connection;
pub mod error;
mod registry;

pub use connection::{ConnectionId, HandlerState, Message, OUTBOUND_QUEUE_CAPACITY, PusherChannel};
pub use error::{DeliveryError, ServerError};
pub use registry::{BroadcastReport, ConnectionRegistry};

#[cfg(test)]
pub use registry::MockConnectionRegistry;
