use std::collections::HashSet;

use uuid::Uuid;

use crate::store::MessageRecord;

/// Local view of one conversation: stored history followed by live arrivals.
///
/// A message id is only ever shown once, whichever path delivered it first.
#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<MessageRecord>,
    seen: HashSet<Uuid>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the view with `history` (oldest first), then re-appends any live
    /// message the history does not contain yet, keeping their arrival order.
    pub fn load_history(&mut self, history: Vec<MessageRecord>) {
        let live = std::mem::take(&mut self.messages);
        self.seen.clear();

        for message in history.into_iter().chain(live) {
            self.push(message);
        }
    }

    /// Appends `message` unless it is already shown. Returns whether it was new.
    pub fn push(&mut self, message: MessageRecord) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
