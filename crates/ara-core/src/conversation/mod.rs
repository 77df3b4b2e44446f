//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `phase`: Top-level conversation phases (`ConversationPhase`)
//! - `message`: Timeline message types (`ChatMessage`, `MessageSender`)
//! - `timeline`: Append-only message log with serialized emission (`MessageTimeline`)
//! - `script`: The fixed conversational script

mod message;
mod phase;
pub mod script;
mod timeline;

pub use message::{ChatMessage, MessageId, MessageSender};
pub use phase::ConversationPhase;
pub use timeline::{MessageTimeline, ThinkingGuard, TimelineView};
