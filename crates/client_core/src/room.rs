use shared::{domain::ChatId, protocol::ClientRequest};

/// Which live-channel room this connection last asked to join.
///
/// The protocol has no leave frame, so switching conversations only ever
/// produces a `join chat` for the new id.
#[derive(Debug, Default)]
pub struct RoomTracker {
    joined: Option<ChatId>,
    deferred: Option<ChatId>,
}

impl RoomTracker {
    pub fn joined(&self) -> Option<&ChatId> {
        self.joined.as_ref()
    }

    pub fn deferred(&self) -> Option<&ChatId> {
        self.deferred.as_ref()
    }

    /// Returns the frame to emit, or `None` when already joined or waiting for `connected`.
    pub fn join(&mut self, chat_id: &ChatId, connected: bool) -> Option<ClientRequest> {
        if self.joined.as_ref() == Some(chat_id) {
            self.deferred = None;
            return None;
        }
        if !connected {
            self.deferred = Some(chat_id.clone());
            return None;
        }
        self.deferred = None;
        self.joined = Some(chat_id.clone());
        Some(ClientRequest::JoinChat {
            chat_id: chat_id.clone(),
        })
    }

    pub fn on_connected(&mut self) -> Option<ClientRequest> {
        let chat_id = self.deferred.take()?;
        self.join(&chat_id, true)
    }

    pub fn discard_deferred(&mut self) {
        self.deferred = None;
    }
}
