//! Intent outcomes.

use ara_core::capture::RecordingState;
use ara_core::conversation::ConversationPhase;
use serde::Serialize;

/// Why an intent was accepted but had no effect.
///
/// Ignored intents never add a message to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "state", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The intent does not apply to the current phase.
    WrongPhase(ConversationPhase),
    /// An analysis or finalize call is still outstanding.
    CallPending,
    /// A batch or recording upload is already being handled.
    MediaFlowActive,
    /// The camera is not in a state that accepts the intent.
    CaptureState(RecordingState),
    /// The conversation was restarted while the intent was running.
    Stale,
}

/// The effect of a user intent that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Ignored { reason: IgnoreReason },
}

impl Outcome {
    pub fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }
}
