//! Timeline message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Creation-ordered message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageSender {
    /// Typed or triggered by the user.
    User,
    /// Written by the assistant.
    System,
    /// A failure surfaced to the user.
    Error,
}

/// A single message in the conversation timeline.
///
/// Messages are immutable once created; the fields are only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    id: MessageId,
    sender: MessageSender,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub(crate) fn new(id: MessageId, sender: MessageSender, content: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> MessageSender {
        self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_error(&self) -> bool {
        self.sender == MessageSender::Error
    }
}
