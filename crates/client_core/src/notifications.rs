use shared::domain::{ChatId, MessageId, NotificationEntry};

/// Pending notifications for conversations that are not on screen.
#[derive(Debug, Default)]
pub struct NotificationRouter {
    pending: Vec<NotificationEntry>,
}

impl NotificationRouter {
    pub fn entries(&self) -> &[NotificationEntry] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Appends unless an entry for the same message is already queued.
    pub fn push(&mut self, entry: NotificationEntry) -> bool {
        if self.contains(entry.message_id()) {
            return false;
        }
        self.pending.push(entry);
        true
    }

    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.pending
            .iter()
            .any(|entry| entry.message_id() == message_id)
    }

    pub fn clear_chat(&mut self, chat_id: &ChatId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.chat_id() != chat_id);
        before - self.pending.len()
    }

    pub fn dismiss(&mut self, message_id: &MessageId) -> Option<NotificationEntry> {
        let index = self
            .pending
            .iter()
            .position(|entry| entry.message_id() == message_id)?;
        Some(self.pending.remove(index))
    }
}
