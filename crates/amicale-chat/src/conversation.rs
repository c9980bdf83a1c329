//! The active conversation's message history.
//!
//! One conversation is loaded at a time.  Every target switch bumps a
//! generation counter and clears the history; a history response is merged
//! only if it still carries the current generation, so a slow response for
//! conversation A can never overwrite the view after the user has moved on
//! to conversation B.

use tracing::debug;

use amicale_shared::types::{ChatTarget, MessageId};
use amicale_shared::Message;

/// How a history load was initiated.  Poll ticks merge silently; only a
/// user-initiated load may scroll the view to the latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    UserInitiated,
    PollTick,
}

/// Result of offering a fetched history to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// The snapshot was merged.  `scroll_to_latest` is set only for
    /// user-initiated loads.
    Applied { scroll_to_latest: bool },
    /// The snapshot belonged to a previous target and was discarded.
    Stale,
}

/// Message history of the currently selected conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    target: Option<ChatTarget>,
    messages: Vec<Message>,
    generation: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<ChatTarget> {
        self.target
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Switch to a new target: the previous history is discarded and any
    /// in-flight load for it is invalidated.  Returns the new generation to
    /// stamp onto the fetch.
    pub fn retarget(&mut self, target: ChatTarget) -> u64 {
        self.target = Some(target);
        self.messages.clear();
        self.generation += 1;
        self.generation
    }

    /// Tear the conversation down (view closed).
    pub fn close(&mut self) {
        self.target = None;
        self.messages.clear();
        self.generation += 1;
    }

    /// Merge a fetched history snapshot, unless it is stale.
    pub fn apply_history(
        &mut self,
        generation: u64,
        mut messages: Vec<Message>,
        kind: LoadKind,
    ) -> HistoryOutcome {
        if generation != self.generation || self.target.is_none() {
            debug!(
                stale = generation,
                current = self.generation,
                "Discarding history for a previous target"
            );
            return HistoryOutcome::Stale;
        }
        // Server order is oldest-first already; the sort is stable, so
        // messages sharing a timestamp keep their server order.
        messages.sort_by_key(|m| m.created_at);
        self.messages = messages;
        HistoryOutcome::Applied {
            scroll_to_latest: kind == LoadKind::UserInitiated,
        }
    }

    /// Append a server-acknowledged message to the end of the history.
    /// Dropped if the view has moved to another conversation since the send
    /// started, or if the message already arrived through a poll.
    pub fn append(&mut self, message: Message) -> bool {
        if self.target != Some(message.target) {
            debug!(id = %message.id, "Dropping acknowledged message for a previous target");
            return false;
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace a message in place with the server's canonical record,
    /// preserving its position.  Used by edit/delete reconciliation.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }
}
