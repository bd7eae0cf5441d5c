//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the relationship graph, the authorization gate
//! and the message log.

mod chat;
mod conversation;
mod gate;
mod message_log;
mod relationship;

pub use chat::{ChatService, SendChannel};
pub use conversation::{ConversationService, ConversationSummary};
pub use gate::{AuthorizationGate, MessageAccess};
pub use message_log::MessageLog;
pub use relationship::{AccountProfile, FollowResult, RelationshipService};
