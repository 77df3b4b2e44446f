//! Append-only message timeline with serialized emission.
//!
//! Every append goes through a single emission slot (a FIFO `tokio::sync::Mutex`).
//! System and error messages hold the slot for the compose delay while the
//! typing indicator is shown, so messages always land in the order they were
//! issued, regardless of how long each one waits.
//!
//! The timeline carries a generation number. [`MessageTimeline::reset_to`]
//! moves it forward, and [`MessageTimeline::append_for`] drops any message
//! addressed to an older generation, so work that outlives a reset cannot
//! leak into the new conversation. The thinking indicator is scoped the same
//! way: a call that never returns stops showing once the timeline moves on.

use super::message::{ChatMessage, MessageId, MessageSender};
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// Read-only snapshot of the timeline for front-ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineView {
    pub messages: Vec<ChatMessage>,
    /// A system message is being composed (typing indicator).
    pub composing: bool,
    /// A primary backend call is outstanding (thinking indicator).
    pub thinking: bool,
}

struct EmissionSlot {
    next_id: u64,
    generation: u64,
}

#[derive(Default)]
struct ThinkingCalls {
    generation: u64,
    outstanding: usize,
}

pub struct MessageTimeline {
    view: watch::Sender<TimelineView>,
    slot: Mutex<EmissionSlot>,
    compose_delay: Duration,
    thinking: StdMutex<ThinkingCalls>,
}

impl MessageTimeline {
    pub fn new(compose_delay: Duration) -> Self {
        let (view, _) = watch::channel(TimelineView::default());
        Self {
            view,
            slot: Mutex::new(EmissionSlot {
                next_id: 1,
                generation: 0,
            }),
            compose_delay,
            thinking: StdMutex::new(ThinkingCalls::default()),
        }
    }

    /// Appends a message only if the timeline is still at `generation`.
    ///
    /// User messages land immediately; system and error messages are shown
    /// after the compose delay. Returns `None` when a reset happened in
    /// between; nothing is shown.
    pub async fn append_for(
        &self,
        generation: u64,
        sender: MessageSender,
        content: impl Into<String>,
    ) -> Option<ChatMessage> {
        let mut slot = self.slot.lock().await;
        if slot.generation != generation {
            tracing::debug!(
                "[MessageTimeline] Dropped {} message for stale generation {} (current {})",
                sender,
                generation,
                slot.generation
            );
            return None;
        }
        Some(self.emit(&mut slot, sender, content.into()).await)
    }

    fn delay_for(&self, sender: MessageSender) -> Duration {
        match sender {
            MessageSender::User => Duration::ZERO,
            MessageSender::System | MessageSender::Error => self.compose_delay,
        }
    }

    async fn emit(
        &self,
        slot: &mut EmissionSlot,
        sender: MessageSender,
        content: String,
    ) -> ChatMessage {
        let delay = self.delay_for(sender);
        if !delay.is_zero() {
            let _composing = ComposingGuard::show(&self.view);
            tokio::time::sleep(delay).await;
        }

        let message = ChatMessage::new(MessageId(slot.next_id), sender, content);
        slot.next_id += 1;

        tracing::debug!(
            "[MessageTimeline] Appended {} message #{}",
            sender,
            message.id().0
        );
        self.view
            .send_modify(|view| view.messages.push(message.clone()));
        message
    }

    /// Clears all messages once the in-flight emission, if any, has landed,
    /// and moves to `generation`.
    ///
    /// Identifiers keep increasing across resets. Thinking calls from older
    /// generations no longer count.
    pub async fn reset_to(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        slot.generation = generation;

        let mut thinking = self.thinking_calls();
        if generation > thinking.generation {
            *thinking = ThinkingCalls {
                generation,
                outstanding: 0,
            };
        }
        let still_thinking = thinking.outstanding > 0;
        self.view.send_modify(|view| {
            view.messages.clear();
            view.composing = false;
            view.thinking = still_thinking;
        });
    }

    /// Shows the thinking indicator until the returned guard is dropped.
    ///
    /// A call made for an older generation shows nothing.
    pub fn thinking(&self, generation: u64) -> ThinkingGuard<'_> {
        let mut thinking = self.thinking_calls();
        if generation > thinking.generation {
            *thinking = ThinkingCalls {
                generation,
                outstanding: 0,
            };
        }
        let counted = generation == thinking.generation;
        if counted {
            thinking.outstanding += 1;
            if thinking.outstanding == 1 {
                self.view.send_modify(|view| view.thinking = true);
            }
        }
        ThinkingGuard {
            timeline: self,
            generation,
            counted,
        }
    }

    fn thinking_calls(&self) -> MutexGuard<'_, ThinkingCalls> {
        self.thinking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.view.borrow().messages.clone()
    }

    pub fn view(&self) -> TimelineView {
        self.view.borrow().clone()
    }

    /// Subscribes to timeline changes.
    pub fn subscribe(&self) -> watch::Receiver<TimelineView> {
        self.view.subscribe()
    }
}

struct ComposingGuard<'a> {
    view: &'a watch::Sender<TimelineView>,
}

impl<'a> ComposingGuard<'a> {
    fn show(view: &'a watch::Sender<TimelineView>) -> Self {
        view.send_modify(|view| view.composing = true);
        Self { view }
    }
}

impl Drop for ComposingGuard<'_> {
    fn drop(&mut self) {
        self.view.send_modify(|view| view.composing = false);
    }
}

/// Keeps the thinking indicator visible while alive.
pub struct ThinkingGuard<'a> {
    timeline: &'a MessageTimeline,
    generation: u64,
    counted: bool,
}

impl Drop for ThinkingGuard<'_> {
    fn drop(&mut self) {
        if !self.counted {
            return;
        }
        let mut thinking = self.timeline.thinking_calls();
        if thinking.generation != self.generation || thinking.outstanding == 0 {
            return;
        }
        thinking.outstanding -= 1;
        if thinking.outstanding == 0 {
            self.timeline
                .view
                .send_modify(|view| view.thinking = false);
        }
    }
}
