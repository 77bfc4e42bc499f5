use std::time::Duration;

use shared::{domain::ChatId, protocol::ClientRequest};
use tokio::time::Instant;

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(3000);

/// Identifies one armed quiet-window timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTicket {
    pub chat_id: ChatId,
    pub epoch: u64,
    pub deadline: Instant,
}

#[derive(Debug)]
pub struct Keystroke {
    /// `typing` frame for the first keystroke of a burst.
    pub start: Option<ClientRequest>,
    pub timer: TimerTicket,
}

#[derive(Debug)]
struct TypingState {
    chat_id: ChatId,
    locally_typing: bool,
    last_keystroke: Option<Instant>,
    remote_typing: bool,
}

/// Typing indicator state for the active conversation.
///
/// `epoch` advances on every conversation switch so a timer armed for an
/// earlier conversation can never match the current state.
#[derive(Debug)]
pub struct TypingDebouncer {
    quiet_window: Duration,
    epoch: u64,
    state: Option<TypingState>,
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW)
    }
}

impl TypingDebouncer {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            epoch: 0,
            state: None,
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    pub fn active_chat(&self) -> Option<&ChatId> {
        self.state.as_ref().map(|state| &state.chat_id)
    }

    pub fn locally_typing(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.locally_typing)
    }

    pub fn remote_typing(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.remote_typing)
    }

    /// Drops the old state without a `stop typing` frame. Returns true when a
    /// remote indicator was showing and is now gone.
    pub fn activate(&mut self, chat_id: Option<ChatId>) -> bool {
        self.epoch += 1;
        let was_remote_typing = self.remote_typing();
        self.state = chat_id.map(|chat_id| TypingState {
            chat_id,
            locally_typing: false,
            last_keystroke: None,
            remote_typing: false,
        });
        was_remote_typing
    }

    pub fn keystroke(&mut self, now: Instant, connected: bool) -> Option<Keystroke> {
        if !connected {
            return None;
        }
        let quiet_window = self.quiet_window;
        let epoch = self.epoch;
        let state = self.state.as_mut()?;

        let start = if state.locally_typing {
            None
        } else {
            state.locally_typing = true;
            Some(ClientRequest::Typing {
                chat_id: state.chat_id.clone(),
            })
        };
        state.last_keystroke = Some(now);

        Some(Keystroke {
            start,
            timer: TimerTicket {
                chat_id: state.chat_id.clone(),
                epoch,
                deadline: now + quiet_window,
            },
        })
    }

    pub fn timer_fired(&mut self, ticket: &TimerTicket, now: Instant) -> Option<ClientRequest> {
        if ticket.epoch != self.epoch {
            return None;
        }
        let quiet_window = self.quiet_window;
        let state = self.state.as_mut()?;
        if state.chat_id != ticket.chat_id || !state.locally_typing {
            return None;
        }
        let last = state.last_keystroke?;
        if now.saturating_duration_since(last) < quiet_window {
            return None;
        }
        state.locally_typing = false;
        Some(ClientRequest::StopTyping {
            chat_id: state.chat_id.clone(),
        })
    }

    /// Ends the local indicator immediately, as when a message is sent.
    pub fn stop_now(&mut self) -> Option<ClientRequest> {
        let state = self.state.as_mut()?;
        if !state.locally_typing {
            return None;
        }
        state.locally_typing = false;
        Some(ClientRequest::StopTyping {
            chat_id: state.chat_id.clone(),
        })
    }

    /// Applies an inbound indicator. Returns the new value when it changed.
    pub fn set_remote(&mut self, chat_id: &ChatId, typing: bool) -> Option<bool> {
        let state = self.state.as_mut()?;
        if &state.chat_id != chat_id || state.remote_typing == typing {
            return None;
        }
        state.remote_typing = typing;
        Some(typing)
    }
}
