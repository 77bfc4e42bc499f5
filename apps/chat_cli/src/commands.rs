//! Line commands typed at the chat prompt.

use shared::domain::{ChatId, Conversation, MessageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Open { chat_id: ChatId, name: Option<String> },
    Close,
    Notifications,
    Dismiss { message_id: MessageId },
    Follow { message_id: MessageId },
    Transcript,
    Help,
    Quit,
    Say(String),
}

impl InputCommand {
    /// Conversation metadata for `/open`; the server-side list is not fetched.
    pub fn conversation(chat_id: &ChatId, name: Option<&str>) -> Conversation {
        Conversation {
            id: chat_id.clone(),
            name: name.unwrap_or(chat_id.as_str()).to_string(),
            is_group: name.is_some(),
            users: Vec::new(),
        }
    }
}

pub const HELP: &str = "\
/open <chat_id> [name]   select a conversation; naming it marks it as a group
/close                   clear the selection
/notifications           list pending notifications
/dismiss <message_id>    drop one notification
/follow <message_id>     open the conversation of a notification
/transcript              print the current transcript
/quit                    exit
anything else            send as a message";

pub fn parse_input_line(line: &str) -> Result<InputCommand, String> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(InputCommand::Say(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "open" => {
            let chat_id = parts.next().ok_or("usage: /open <chat_id> [name]")?;
            let rest: Vec<&str> = parts.collect();
            Ok(InputCommand::Open {
                chat_id: ChatId::new(chat_id),
                name: (!rest.is_empty()).then(|| rest.join(" ")),
            })
        }
        "close" => Ok(InputCommand::Close),
        "notifications" | "n" => Ok(InputCommand::Notifications),
        "dismiss" => parts
            .next()
            .map(|id| InputCommand::Dismiss {
                message_id: MessageId::new(id),
            })
            .ok_or_else(|| "usage: /dismiss <message_id>".to_string()),
        "follow" => parts
            .next()
            .map(|id| InputCommand::Follow {
                message_id: MessageId::new(id),
            })
            .ok_or_else(|| "usage: /follow <message_id>".to_string()),
        "transcript" | "t" => Ok(InputCommand::Transcript),
        "help" => Ok(InputCommand::Help),
        "quit" | "exit" => Ok(InputCommand::Quit),
        other => Err(format!("unknown command /{other}; try /help")),
    }
}
