use std::sync::{Arc, RwLock};

use shared::{
    domain::{ChatId, Conversation, Message, MessageId, NotificationEntry, Session},
    error::ApiException,
    protocol::{ClientRequest, ServerEvent, ServerEventKind},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    api::{ChatApi, HttpChatApi},
    config::ClientSettings,
    error::{ClientError, ValidationError},
    notifications::NotificationRouter,
    room::RoomTracker,
    sync_engine::{LiveRoute, MessageSync},
    transport::{ConnectionHandle, EventHandlers, Transport},
    typing::{TimerTicket, TypingDebouncer},
    ClientEvent,
};

pub type TypingHandler = Arc<dyn Fn(&ChatId, bool) + Send + Sync>;

/// Session-scoped synchronization context owned by the application shell.
pub struct ChatClient {
    session: Session,
    transport: Arc<dyn Transport>,
    api: Arc<dyn ChatApi>,
    inner: Mutex<SyncState>,
    handlers: EventHandlers,
    typing_handlers: RwLock<Vec<TypingHandler>>,
    events: broadcast::Sender<ClientEvent>,
}

struct SyncState {
    messages: MessageSync,
    rooms: RoomTracker,
    notifications: NotificationRouter,
    typing: TypingDebouncer,
    typing_timer: Option<JoinHandle<()>>,
    draft: String,
}

impl SyncState {
    fn cancel_typing_timer(&mut self) {
        if let Some(timer) = self.typing_timer.take() {
            timer.abort();
        }
    }
}

impl ChatClient {
    pub fn new(
        session: Session,
        settings: &ClientSettings,
        transport: Arc<dyn Transport>,
        api: Arc<dyn ChatApi>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(settings.event_channel_capacity.max(1));
        Arc::new(Self {
            session,
            transport,
            api,
            inner: Mutex::new(SyncState {
                messages: MessageSync::default(),
                rooms: RoomTracker::default(),
                notifications: NotificationRouter::default(),
                typing: TypingDebouncer::new(settings.quiet_window()),
                typing_timer: None,
                draft: String::new(),
            }),
            handlers: EventHandlers::default(),
            typing_handlers: RwLock::new(Vec::new()),
            events,
        })
    }

    /// Opens the live channel and the durable API for `session`.
    pub async fn connect(
        session: Session,
        settings: &ClientSettings,
    ) -> Result<Arc<Self>, ClientError> {
        let (connection, inbound) = ConnectionHandle::connect(settings, &session).await?;
        let api = HttpChatApi::new(settings).map_err(|source| ClientError::Connection {
            url: settings.server_url.clone(),
            source,
        })?;
        let client = Self::new(session, settings, connection, Arc::new(api));
        client.spawn_event_loop(inbound);
        Ok(client)
    }

    /// Drains inbound events one at a time, in arrival order.
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut inbound: mpsc::Receiver<ServerEvent>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                client.handle_server_event(event).await;
            }
            info!(
                user_id = %client.session.user_id(),
                "live channel closed; event loop stopped"
            );
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Registers a handler invoked after the client has applied each inbound event of `kind`.
    pub fn on<F>(&self, kind: ServerEventKind, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.handlers.on(kind, handler);
    }

    pub fn on_typing_change<F>(&self, handler: F)
    where
        F: Fn(&ChatId, bool) + Send + Sync + 'static,
    {
        self.typing_handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(handler));
    }

    pub async fn handle_server_event(&self, event: ServerEvent) {
        match &event {
            ServerEvent::Connected => {
                {
                    let mut guard = self.inner.lock().await;
                    if let Some(join) = guard.rooms.on_connected() {
                        info!(event = join.name(), "joining deferred room");
                        self.transport.emit(join);
                    }
                }
                info!(user_id = %self.session.user_id(), "live channel ready");
                self.publish(ClientEvent::Connected);
            }
            ServerEvent::MessageReceived { message, chat } => {
                self.route_live_message(message.clone(), chat.clone()).await;
            }
            ServerEvent::Typing { chat_id } => self.apply_remote_typing(chat_id, true).await,
            ServerEvent::StopTyping { chat_id } => self.apply_remote_typing(chat_id, false).await,
            ServerEvent::Error(api_error) => {
                let notice = ApiException::from(api_error.clone()).to_string();
                warn!("server reported error: {notice}");
                self.publish(ClientEvent::Error(notice));
            }
        }
        self.handlers.dispatch(&event);
    }

    async fn route_live_message(&self, message: Message, chat: Conversation) {
        let chat_id = message.chat_id.clone();
        let message_id = message.id.clone();
        let own_message = message.sender.id == *self.session.user_id();

        let (route, pending, appended) = {
            let mut guard = self.inner.lock().await;
            let route = guard.messages.route_live(message.clone());
            match route {
                LiveRoute::Appended => (route, None, Some(message)),
                LiveRoute::Background if !own_message => {
                    let pending = guard
                        .notifications
                        .push(NotificationEntry { message, chat })
                        .then(|| guard.notifications.len());
                    (route, pending, None)
                }
                _ => (route, None, None),
            }
        };

        match route {
            LiveRoute::Appended => {
                if let Some(message) = appended {
                    self.publish(ClientEvent::MessageAppended { message });
                }
                self.publish(ClientEvent::RefreshRequested { chat_id });
            }
            LiveRoute::Background => match pending {
                Some(pending) => {
                    debug!(chat_id = %chat_id, message_id = %message_id, pending, "queued notification");
                    self.publish(ClientEvent::NotificationsChanged { pending });
                }
                None => debug!(
                    chat_id = %chat_id,
                    message_id = %message_id,
                    own_message,
                    "background message already queued or self-authored"
                ),
            },
            LiveRoute::Buffered => {
                debug!(chat_id = %chat_id, message_id = %message_id, "held live message until history lands")
            }
            LiveRoute::Duplicate => {
                debug!(chat_id = %chat_id, message_id = %message_id, "ignored duplicate live message")
            }
            LiveRoute::Dropped => {
                debug!(chat_id = %chat_id, message_id = %message_id, "history unavailable; live message dropped")
            }
        }
    }

    async fn apply_remote_typing(&self, chat_id: &ChatId, typing: bool) {
        let changed = { self.inner.lock().await.typing.set_remote(chat_id, typing) };
        if let Some(typing) = changed {
            self.notify_typing(chat_id, typing);
        }
    }

    fn notify_typing(&self, chat_id: &ChatId, typing: bool) {
        let handlers = self
            .typing_handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in &handlers {
            handler(chat_id, typing);
        }
        self.publish(ClientEvent::TypingChanged {
            chat_id: chat_id.clone(),
            typing,
        });
    }

    pub async fn select_conversation(&self, chat: Option<Conversation>) -> Result<(), ClientError> {
        let chat_id = chat.as_ref().map(|chat| chat.id.clone());
        let (ticket, previous_typing, cleared, pending) = {
            let mut guard = self.inner.lock().await;
            guard.cancel_typing_timer();
            let previous_chat = guard.typing.active_chat().cloned();
            let remote_was_typing = guard.typing.activate(chat_id.clone());
            guard.rooms.discard_deferred();
            let cleared = chat_id
                .as_ref()
                .map(|id| guard.notifications.clear_chat(id))
                .unwrap_or_default();
            let ticket = guard.messages.select(chat);
            (
                ticket,
                previous_chat.filter(|_| remote_was_typing),
                cleared,
                guard.notifications.len(),
            )
        };

        if let Some(previous_chat) = previous_typing {
            self.notify_typing(&previous_chat, false);
        }
        if cleared > 0 {
            self.publish(ClientEvent::NotificationsChanged { pending });
        }
        self.publish(ClientEvent::TranscriptReset {
            chat_id: chat_id.clone(),
        });

        let Some(ticket) = ticket else {
            info!("conversation closed");
            return Ok(());
        };
        info!(
            chat_id = %ticket.chat_id,
            generation = ticket.generation,
            "conversation selected; loading history"
        );

        let result = self.api.fetch_history(&self.session, &ticket.chat_id).await;

        let mut guard = self.inner.lock().await;
        match result {
            Ok(history) => {
                let Some(replayed) = guard.messages.complete_fetch(&ticket, history) else {
                    debug!(
                        chat_id = %ticket.chat_id,
                        generation = ticket.generation,
                        "discarding stale history response"
                    );
                    return Ok(());
                };
                let connected = self.transport.is_connected();
                if let Some(join) = guard.rooms.join(&ticket.chat_id, connected) {
                    self.transport.emit(join);
                }
                let count = guard.messages.transcript().len();
                drop(guard);

                info!(chat_id = %ticket.chat_id, count, replayed, connected, "history loaded");
                self.publish(ClientEvent::TranscriptLoaded {
                    chat_id: ticket.chat_id,
                    count,
                });
                Ok(())
            }
            Err(source) => {
                if !guard.messages.fail_fetch(&ticket) {
                    debug!(
                        chat_id = %ticket.chat_id,
                        generation = ticket.generation,
                        "discarding stale history failure"
                    );
                    return Ok(());
                }
                drop(guard);
                warn!(chat_id = %ticket.chat_id, "failed to load history: {source}");
                Err(ClientError::Load {
                    chat_id: ticket.chat_id,
                    source,
                })
            }
        }
    }

    pub async fn send_message(&self, body: &str) -> Result<Message, ClientError> {
        if body.trim().is_empty() {
            return Err(ValidationError::EmptyBody.into());
        }

        let chat_id = {
            let mut guard = self.inner.lock().await;
            let chat_id = guard
                .messages
                .active_id()
                .cloned()
                .ok_or(ValidationError::NoActiveConversation)?;
            guard.draft.clear();
            guard.cancel_typing_timer();
            if let Some(stop) = guard.typing.stop_now() {
                self.transport.emit(stop);
            }
            chat_id
        };

        let message = self
            .api
            .post_message(&self.session, &chat_id, body)
            .await
            .map_err(|source| {
                warn!(chat_id = %chat_id, "failed to send message: {source}");
                ClientError::Send {
                    chat_id: chat_id.clone(),
                    source,
                }
            })?;

        let route = {
            let mut guard = self.inner.lock().await;
            guard.messages.route_confirmed(message.clone())
        };
        self.transport.emit(ClientRequest::NewMessage {
            message: message.clone(),
        });

        info!(chat_id = %chat_id, message_id = %message.id, ?route, "message sent");
        if route == LiveRoute::Appended {
            self.publish(ClientEvent::MessageAppended {
                message: message.clone(),
            });
        }
        Ok(message)
    }

    /// Records the compose field and drives the local typing indicator.
    pub async fn compose_input(self: &Arc<Self>, text: &str) {
        let mut guard = self.inner.lock().await;
        guard.draft = text.to_string();

        let connected = self.transport.is_connected();
        let Some(keystroke) = guard.typing.keystroke(Instant::now(), connected) else {
            return;
        };
        if let Some(start) = keystroke.start {
            self.transport.emit(start);
        }

        guard.cancel_typing_timer();
        let client = Arc::clone(self);
        let ticket = keystroke.timer;
        guard.typing_timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(ticket.deadline).await;
            client.typing_timer_fired(ticket).await;
        }));
    }

    async fn typing_timer_fired(&self, ticket: TimerTicket) {
        let mut guard = self.inner.lock().await;
        if let Some(stop) = guard.typing.timer_fired(&ticket, Instant::now()) {
            guard.typing_timer = None;
            debug!(chat_id = %ticket.chat_id, "typing quiet window elapsed");
            self.transport.emit(stop);
        }
    }

    pub async fn current_transcript(&self) -> Vec<Message> {
        self.inner.lock().await.messages.transcript().to_vec()
    }

    pub async fn pending_notifications(&self) -> Vec<NotificationEntry> {
        self.inner.lock().await.notifications.entries().to_vec()
    }

    pub async fn dismiss_notification(&self, message_id: &MessageId) -> Option<NotificationEntry> {
        let (dismissed, pending) = {
            let mut guard = self.inner.lock().await;
            let dismissed = guard.notifications.dismiss(message_id);
            (dismissed, guard.notifications.len())
        };
        if dismissed.is_some() {
            self.publish(ClientEvent::NotificationsChanged { pending });
        }
        dismissed
    }

    /// Selects the conversation a notification belongs to, which also clears it.
    pub async fn open_notification(&self, message_id: &MessageId) -> Result<bool, ClientError> {
        let chat = {
            let guard = self.inner.lock().await;
            guard
                .notifications
                .entries()
                .iter()
                .find(|entry| entry.message_id() == message_id)
                .map(|entry| entry.chat.clone())
        };
        let Some(chat) = chat else {
            return Ok(false);
        };
        self.select_conversation(Some(chat)).await?;
        Ok(true)
    }

    pub async fn active_conversation(&self) -> Option<Conversation> {
        self.inner.lock().await.messages.active().cloned()
    }

    pub async fn draft(&self) -> String {
        self.inner.lock().await.draft.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.messages.is_loading()
    }

    pub async fn remote_typing(&self) -> bool {
        self.inner.lock().await.typing.remote_typing()
    }

    pub async fn locally_typing(&self) -> bool {
        self.inner.lock().await.typing.locally_typing()
    }

    fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
