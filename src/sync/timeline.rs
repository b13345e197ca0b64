use std::collections::HashSet;
use crate::models::chat::{ ChatMessage, MessageId };
use crate::store::sort_chronologically;

/// Ordered, id-unique view of one conversation.
///
/// Entries stay sorted by `created_at`; an insert carrying an id that is
/// already present is dropped.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    messages: Vec<ChatMessage>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    pub fn from_history(mut history: Vec<ChatMessage>) -> Self {
        sort_chronologically(&mut history);
        let mut timeline = Self::default();
        for message in history {
            timeline.apply(message);
        }
        timeline
    }

    /// Merges one message. Returns false when it was a duplicate.
    pub fn apply(&mut self, message: ChatMessage) -> bool {
        if let Some(id) = message.id {
            if !self.ids.insert(id) {
                return false;
            }
        }

        let position = match message.created_at {
            Some(ts) =>
                self.messages
                    .iter()
                    .rposition(|m| m.created_at.is_some_and(|existing| existing <= ts))
                    .map_or(0, |i| i + 1),
            None => self.messages.len(),
        };
        self.messages.insert(position, message);
        true
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
