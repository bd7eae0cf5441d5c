//! Realtime layer
//!
//! - Presence registry (who is online, and on which connections)
//! - Chat rooms keyed by a canonical pair of account ids
//! - Delivery engine routing chat, typing and notification events

mod engine;
pub mod events;
mod presence;

pub use engine::{EngineLimits, RealtimeEngine};
pub use events::{ClientEvent, ServerEvent, room_key};
pub use presence::PresenceRegistry;

use std::fmt;

/// Process-local id of one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
