use shared::domain::ChatId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message body is empty")]
    EmptyBody,
    #[error("no conversation is selected")]
    NoActiveConversation,
}

/// Failures surfaced to the presentation layer as transient notices.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect live channel {url}: {source}")]
    Connection { url: String, source: anyhow::Error },
    #[error("failed to load messages for chat {chat_id}: {source}")]
    Load {
        chat_id: ChatId,
        source: anyhow::Error,
    },
    #[error("failed to send message to chat {chat_id}: {source}")]
    Send {
        chat_id: ChatId,
        source: anyhow::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ClientError {
    /// Load failures clear on the next selection of the same conversation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Connection { .. })
    }
}
