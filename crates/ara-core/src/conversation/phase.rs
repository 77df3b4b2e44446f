//! Conversation phase state.

use serde::{Deserialize, Serialize};
use strum::Display;

/// The active step of a conversation.
///
/// Phases only move forward (`Intake` → `MediaPending` → `Complete`);
/// a restart is the only way back to `Intake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationPhase {
    /// Waiting for the accident description.
    #[default]
    Intake,
    /// Description analyzed; waiting for photos or a video.
    MediaPending,
    /// Report generated. Terminal until restart.
    Complete,
}

impl ConversationPhase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Intake => Some(Self::MediaPending),
            Self::MediaPending => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Returns true if `target` is the immediate successor of this phase.
    pub fn can_advance_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}
