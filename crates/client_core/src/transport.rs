use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use futures::{SinkExt, StreamExt};
use shared::{
    domain::Session,
    protocol::{ClientRequest, ServerEvent, ServerEventKind},
};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{config::ClientSettings, error::ClientError};

/// Outbound half of the live channel as seen by the sync core.
pub trait Transport: Send + Sync {
    /// Fire-and-forget; frames written after the socket closed are dropped.
    fn emit(&self, request: ClientRequest);
    fn is_connected(&self) -> bool;
}

/// The one websocket connection of a client session.
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<ClientRequest>,
    connected: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Opens the socket, emits `setup` and returns inbound events in arrival order.
    pub async fn connect(
        settings: &ClientSettings,
        session: &Session,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ServerEvent>), ClientError> {
        let url = settings
            .websocket_url()
            .map_err(|source| ClientError::Connection {
                url: settings.server_url.clone(),
                source,
            })?;
        let (ws_stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|err| ClientError::Connection {
                    url: url.to_string(),
                    source: err.into(),
                })?;
        info!(url = %url, user_id = %session.user_id(), "live channel opened");

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientRequest>();
        let (inbound_tx, inbound) = mpsc::channel(settings.event_channel_capacity.max(1));
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            while let Some(request) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&request) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(event = request.name(), "failed to encode live frame: {err}");
                        continue;
                    }
                };
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    warn!("websocket send failed: {err}");
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        let reader_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if event == ServerEvent::Connected {
                                reader_connected.store(true, Ordering::SeqCst);
                            }
                            if inbound_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!("invalid server event: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("websocket receive failed: {err}");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            debug!("live channel reader stopped");
        });

        let handle = Arc::new(Self {
            outbound,
            connected,
        });
        handle.emit(ClientRequest::Setup {
            user: session.user.clone(),
        });
        Ok((handle, inbound))
    }
}

impl Transport for ConnectionHandle {
    fn emit(&self, request: ClientRequest) {
        let name = request.name();
        if self.outbound.send(request).is_err() {
            debug!(event = name, "live channel closed; frame dropped");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handlers registered per inbound event name.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<HashMap<ServerEventKind, Vec<EventHandler>>>,
}

impl EventHandlers {
    pub fn on<F>(&self, kind: ServerEventKind, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Invokes every handler for the event's kind in registration order.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
