use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{ChatId, Conversation, Message, MessageId, NotificationEntry};
use tokio::sync::broadcast;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod notifications;
pub mod room;
pub mod sync_engine;
pub mod transport;
pub mod typing;

pub use api::{ChatApi, HttpChatApi};
pub use client::{ChatClient, TypingHandler};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ValidationError};
pub use transport::{ConnectionHandle, EventHandlers, Transport};

/// Change notifications for views layered on top of the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected,
    /// The active conversation changed; any rendered transcript is stale.
    TranscriptReset {
        chat_id: Option<ChatId>,
    },
    TranscriptLoaded {
        chat_id: ChatId,
        count: usize,
    },
    MessageAppended {
        message: Message,
    },
    /// A live message landed in the active chat; conversation lists should refetch.
    RefreshRequested {
        chat_id: ChatId,
    },
    NotificationsChanged {
        pending: usize,
    },
    TypingChanged {
        chat_id: ChatId,
        typing: bool,
    },
    Error(String),
}

#[async_trait]
pub trait ChatHandle: Send + Sync {
    async fn select_conversation(&self, chat: Option<Conversation>) -> Result<(), ClientError>;
    async fn current_transcript(&self) -> Vec<Message>;
    async fn pending_notifications(&self) -> Vec<NotificationEntry>;
    async fn dismiss_notification(&self, message_id: &MessageId) -> Option<NotificationEntry>;
    async fn open_notification(&self, message_id: &MessageId) -> Result<bool, ClientError>;
    async fn send_message(&self, body: &str) -> Result<Message, ClientError>;
    async fn compose_input(&self, text: &str);
    async fn draft(&self) -> String;
    fn on_typing_change(&self, handler: TypingHandler);
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

#[async_trait]
impl ChatHandle for Arc<ChatClient> {
    async fn select_conversation(&self, chat: Option<Conversation>) -> Result<(), ClientError> {
        ChatClient::select_conversation(self, chat).await
    }

    async fn current_transcript(&self) -> Vec<Message> {
        ChatClient::current_transcript(self).await
    }

    async fn pending_notifications(&self) -> Vec<NotificationEntry> {
        ChatClient::pending_notifications(self).await
    }

    async fn dismiss_notification(&self, message_id: &MessageId) -> Option<NotificationEntry> {
        ChatClient::dismiss_notification(self, message_id).await
    }

    async fn open_notification(&self, message_id: &MessageId) -> Result<bool, ClientError> {
        ChatClient::open_notification(self, message_id).await
    }

    async fn send_message(&self, body: &str) -> Result<Message, ClientError> {
        ChatClient::send_message(self, body).await
    }

    async fn compose_input(&self, text: &str) {
        ChatClient::compose_input(self, text).await
    }

    async fn draft(&self) -> String {
        ChatClient::draft(self).await
    }

    fn on_typing_change(&self, handler: TypingHandler) {
        ChatClient::on_typing_change(self, move |chat_id: &ChatId, typing| {
            handler(chat_id, typing)
        });
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        ChatClient::subscribe_events(self)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
