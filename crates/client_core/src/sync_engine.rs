use shared::domain::{ChatId, Conversation, Message, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Tag carried by a history fetch; the response is applied only while it
/// still matches the selection it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub chat_id: ChatId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveRoute {
    /// Added to the visible transcript.
    Appended,
    /// Held until the pending history fetch lands.
    Buffered,
    /// Already present in the transcript or buffer.
    Duplicate,
    /// Conversation is active but its history failed to load.
    Dropped,
    /// Belongs to a conversation that is not active.
    Background,
}

/// Transcript of the active conversation, merged from history and live events.
#[derive(Debug)]
pub struct MessageSync {
    active: Option<Conversation>,
    generation: u64,
    phase: LoadPhase,
    transcript: Vec<Message>,
    buffered: Vec<Message>,
}

impl Default for MessageSync {
    fn default() -> Self {
        Self {
            active: None,
            generation: 0,
            phase: LoadPhase::Idle,
            transcript: Vec::new(),
            buffered: Vec::new(),
        }
    }
}

impl MessageSync {
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&ChatId> {
        self.active.as_ref().map(|chat| &chat.id)
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Switches the active conversation. A ticket is returned when history
    /// must be fetched.
    pub fn select(&mut self, chat: Option<Conversation>) -> Option<FetchTicket> {
        self.generation += 1;
        self.transcript.clear();
        self.buffered.clear();

        let Some(chat) = chat else {
            self.active = None;
            self.phase = LoadPhase::Idle;
            return None;
        };

        let ticket = FetchTicket {
            chat_id: chat.id.clone(),
            generation: self.generation,
        };
        self.active = Some(chat);
        self.phase = LoadPhase::Loading;
        Some(ticket)
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.active_id() == Some(&ticket.chat_id)
    }

    /// Installs fetched history and replays buffered live messages that the
    /// history does not already contain. `None` means the ticket was stale.
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, history: Vec<Message>) -> Option<usize> {
        if !self.is_current(ticket) || self.phase != LoadPhase::Loading {
            return None;
        }

        self.transcript = history;
        let mut replayed = 0;
        for message in std::mem::take(&mut self.buffered) {
            if !self.contains(&message.id) {
                self.transcript.push(message);
                replayed += 1;
            }
        }
        self.phase = LoadPhase::Loaded;
        Some(replayed)
    }

    /// Returns false when the ticket was stale and the failure is irrelevant.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) || self.phase != LoadPhase::Loading {
            return false;
        }
        self.transcript.clear();
        self.buffered.clear();
        self.phase = LoadPhase::Failed;
        true
    }

    pub fn route_live(&mut self, message: Message) -> LiveRoute {
        if self.active_id() != Some(&message.chat_id) {
            return LiveRoute::Background;
        }

        match self.phase {
            LoadPhase::Loading => {
                if self.buffered.iter().any(|held| held.id == message.id) {
                    return LiveRoute::Duplicate;
                }
                self.buffered.push(message);
                LiveRoute::Buffered
            }
            LoadPhase::Loaded => {
                if self.contains(&message.id) {
                    return LiveRoute::Duplicate;
                }
                self.transcript.push(message);
                LiveRoute::Appended
            }
            LoadPhase::Failed | LoadPhase::Idle => LiveRoute::Dropped,
        }
    }

    /// Routes the server's copy of a message this client just wrote. Unlike
    /// live traffic it is kept after a failed load, since history is not
    /// needed to show the user's own message.
    pub fn route_confirmed(&mut self, message: Message) -> LiveRoute {
        if self.active_id() != Some(&message.chat_id) {
            return LiveRoute::Background;
        }
        if self.phase == LoadPhase::Failed {
            if self.contains(&message.id) {
                return LiveRoute::Duplicate;
            }
            self.transcript.push(message);
            return LiveRoute::Appended;
        }
        self.route_live(message)
    }

    fn contains(&self, message_id: &MessageId) -> bool {
        self.transcript.iter().any(|message| &message.id == message_id)
    }
}

#[cfg(test)]
#[path = "tests/sync_engine_tests.rs"]
mod tests;
