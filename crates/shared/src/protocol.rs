use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, Conversation, Message, Participant},
    error::ApiError,
};

/// Frames the client writes to the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientRequest {
    #[serde(rename = "setup")]
    Setup { user: Participant },
    #[serde(rename = "join chat")]
    JoinChat { chat_id: ChatId },
    #[serde(rename = "new message")]
    NewMessage { message: Message },
    #[serde(rename = "typing")]
    Typing { chat_id: ChatId },
    #[serde(rename = "stop typing")]
    StopTyping { chat_id: ChatId },
}

impl ClientRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::JoinChat { .. } => "join chat",
            Self::NewMessage { .. } => "new message",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stop typing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    Connected,
    MessageReceived,
    Typing,
    StopTyping,
    Error,
}

/// Frames the server pushes over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "message received")]
    MessageReceived { message: Message, chat: Conversation },
    #[serde(rename = "typing")]
    Typing { chat_id: ChatId },
    #[serde(rename = "stop typing")]
    StopTyping { chat_id: ChatId },
    #[serde(rename = "error")]
    Error(ApiError),
}

impl ServerEvent {
    pub fn kind(&self) -> ServerEventKind {
        match self {
            Self::Connected => ServerEventKind::Connected,
            Self::MessageReceived { .. } => ServerEventKind::MessageReceived,
            Self::Typing { .. } => ServerEventKind::Typing,
            Self::StopTyping { .. } => ServerEventKind::StopTyping,
            Self::Error(_) => ServerEventKind::Error,
        }
    }
}

/// Body of the durable `POST /api/message` write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub chat_id: ChatId,
}
