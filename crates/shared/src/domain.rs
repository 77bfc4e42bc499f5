use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ChatId);
id_newtype!(MessageId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
        }
    }
}

/// Authenticated identity owned by the application shell.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Participant,
    pub token: String,
}

impl Session {
    pub fn new(user: Participant, token: impl Into<String>) -> Self {
        Self {
            user,
            token: token.into(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ChatId,
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub users: Vec<Participant>,
}

impl Conversation {
    /// Group chats show their own name; one-to-one chats show the other participant.
    pub fn display_name(&self, me: &UserId) -> String {
        if self.is_group {
            return self.name.clone();
        }
        self.users
            .iter()
            .find(|user| &user.id != me)
            .map(|user| user.name.clone())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: Participant,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub message: Message,
    pub chat: Conversation,
}

impl NotificationEntry {
    pub fn message_id(&self) -> &MessageId {
        &self.message.id
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat.id
    }

    pub fn label(&self, me: &UserId) -> String {
        if self.chat.is_group {
            format!("New Message in {}", self.chat.name)
        } else {
            format!("New Message from {}", self.chat.display_name(me))
        }
    }
}
