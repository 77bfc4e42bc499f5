use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{ChatId, Conversation, Message, MessageId, Participant, Session},
    protocol::ClientRequest,
};
use tokio::sync::{mpsc, oneshot};

use crate::{ChatApi, ChatClient, ClientSettings, Transport};

/// Records every emitted frame instead of writing to a socket.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    frames: Mutex<Vec<ClientRequest>>,
    connected: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn connected() -> Arc<Self> {
        let transport = Self::default();
        transport.set_connected(true);
        Arc::new(transport)
    }

    pub(crate) fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn frames(&self) -> Vec<ClientRequest> {
        self.frames.lock().expect("frames").clone()
    }

    pub(crate) fn joins(&self) -> Vec<ChatId> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                ClientRequest::JoinChat { chat_id } => Some(chat_id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn typing_frames(&self) -> Vec<ClientRequest> {
        self.frames()
            .into_iter()
            .filter(|frame| {
                matches!(
                    frame,
                    ClientRequest::Typing { .. } | ClientRequest::StopTyping { .. }
                )
            })
            .collect()
    }

    pub(crate) fn broadcasts(&self) -> Vec<MessageId> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                ClientRequest::NewMessage { message } => Some(message.id),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn emit(&self, request: ClientRequest) {
        self.frames.lock().expect("frames").push(request);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// A history request parked until the test answers it.
pub(crate) struct PendingFetch {
    pub(crate) chat_id: ChatId,
    reply: oneshot::Sender<Result<Vec<Message>>>,
}

impl PendingFetch {
    pub(crate) fn respond(self, history: Vec<Message>) {
        let _ = self.reply.send(Ok(history));
    }

    pub(crate) fn fail(self, reason: &str) {
        let _ = self.reply.send(Err(anyhow!(reason.to_string())));
    }
}

/// A confirmed write parked until the test releases it.
pub(crate) struct PendingPost {
    pub(crate) message: Message,
    reply: oneshot::Sender<Result<Message>>,
}

impl PendingPost {
    pub(crate) fn confirm(self) {
        let _ = self.reply.send(Ok(self.message));
    }
}

/// In-memory durable API with canned histories.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    histories: Mutex<HashMap<ChatId, Vec<Message>>>,
    failing_chats: Mutex<HashSet<ChatId>>,
    gate: Mutex<Option<mpsc::UnboundedSender<PendingFetch>>>,
    post_gate: Mutex<Option<mpsc::UnboundedSender<PendingPost>>>,
    fail_posts: AtomicBool,
    posts: Mutex<Vec<(ChatId, String)>>,
    fetch_calls: AtomicUsize,
}

impl ScriptedApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Routes every later history request through the returned receiver.
    pub(crate) fn gated(&self) -> mpsc::UnboundedReceiver<PendingFetch> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.gate.lock().expect("gate") = Some(tx);
        rx
    }

    /// Holds every later write until its `PendingPost` is confirmed.
    pub(crate) fn gated_posts(&self) -> mpsc::UnboundedReceiver<PendingPost> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.post_gate.lock().expect("post gate") = Some(tx);
        rx
    }

    pub(crate) fn with_history(&self, chat_id: &str, history: Vec<Message>) {
        self.histories
            .lock()
            .expect("histories")
            .insert(ChatId::new(chat_id), history);
    }

    pub(crate) fn fail_history(&self, chat_id: &str) {
        self.failing_chats
            .lock()
            .expect("failing chats")
            .insert(ChatId::new(chat_id));
    }

    pub(crate) fn fail_posts(&self) {
        self.fail_posts.store(true, Ordering::SeqCst);
    }

    pub(crate) fn posts(&self) -> Vec<(ChatId, String)> {
        self.posts.lock().expect("posts").clone()
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn fetch_history(&self, _session: &Session, chat_id: &ChatId) -> Result<Vec<Message>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().expect("gate").clone();
        if let Some(gate) = gate {
            let (reply, response) = oneshot::channel();
            gate.send(PendingFetch {
                chat_id: chat_id.clone(),
                reply,
            })
            .map_err(|_| anyhow!("fetch gate closed"))?;
            return response.await.map_err(|_| anyhow!("fetch abandoned"))?;
        }
        if self.failing_chats.lock().expect("failing chats").contains(chat_id) {
            return Err(anyhow!("history unavailable for {chat_id}"));
        }
        Ok(self
            .histories
            .lock()
            .expect("histories")
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_message(&self, session: &Session, chat_id: &ChatId, body: &str) -> Result<Message> {
        let count = {
            let mut posts = self.posts.lock().expect("posts");
            posts.push((chat_id.clone(), body.to_string()));
            posts.len()
        };
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(anyhow!("write rejected"));
        }
        let message = Message {
            id: MessageId::new(format!("sent-{count}")),
            chat_id: chat_id.clone(),
            sender: session.user.clone(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        let gate = self.post_gate.lock().expect("post gate").clone();
        let Some(gate) = gate else {
            return Ok(message);
        };
        let (reply, response) = oneshot::channel();
        gate.send(PendingPost { message, reply })
            .map_err(|_| anyhow!("post gate closed"))?;
        response.await.map_err(|_| anyhow!("post abandoned"))?
    }
}

pub(crate) fn alice() -> Participant {
    Participant::new("u1", "Alice")
}

pub(crate) fn bob() -> Participant {
    Participant::new("u2", "Bob")
}

pub(crate) fn chat(id: &str) -> Conversation {
    Conversation {
        id: ChatId::new(id),
        name: format!("Room {id}"),
        is_group: true,
        users: vec![alice(), bob()],
    }
}

pub(crate) fn message_from(sender: Participant, id: &str, chat_id: &str) -> Message {
    Message {
        id: MessageId::new(id),
        chat_id: ChatId::new(chat_id),
        sender,
        body: format!("body of {id}"),
        created_at: Utc::now(),
    }
}

pub(crate) fn message(id: &str, chat_id: &str) -> Message {
    message_from(bob(), id, chat_id)
}

pub(crate) struct Harness {
    pub(crate) client: Arc<ChatClient>,
    pub(crate) transport: Arc<RecordingTransport>,
    pub(crate) api: Arc<ScriptedApi>,
}

pub(crate) fn harness_with(transport: Arc<RecordingTransport>) -> Harness {
    let api = ScriptedApi::new();
    let client = ChatClient::new(
        Session::new(alice(), "token-1"),
        &ClientSettings::default(),
        transport.clone(),
        api.clone(),
    );
    Harness {
        client,
        transport,
        api,
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(RecordingTransport::connected())
}
