use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ChatId, Message, Session},
    error::{ApiError, ApiException},
    protocol::SendMessageRequest,
};
use tracing::debug;

use crate::config::ClientSettings;

/// Request/response channel for durable chat history.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn fetch_history(&self, session: &Session, chat_id: &ChatId) -> Result<Vec<Message>>;
    async fn post_message(&self, session: &Session, chat_id: &ChatId, body: &str)
        -> Result<Message>;
}

pub struct HttpChatApi {
    http: Client,
    server_url: String,
}

impl HttpChatApi {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_history(&self, session: &Session, chat_id: &ChatId) -> Result<Vec<Message>> {
        let res = self
            .http
            .get(format!("{}/api/message/{}", self.server_url, chat_id))
            .bearer_auth(&session.token)
            .send()
            .await?;
        let messages: Vec<Message> = decode(res).await?;
        debug!(chat_id = %chat_id, count = messages.len(), "fetched chat history");
        Ok(messages)
    }

    async fn post_message(
        &self,
        session: &Session,
        chat_id: &ChatId,
        body: &str,
    ) -> Result<Message> {
        let res = self
            .http
            .post(format!("{}/api/message", self.server_url))
            .bearer_auth(&session.token)
            .json(&SendMessageRequest {
                content: body.to_string(),
                chat_id: chat_id.clone(),
            })
            .send()
            .await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json().await?);
    }
    match res.json::<ApiError>().await {
        Ok(api_error) => Err(ApiException::from(api_error).into()),
        Err(_) => Err(anyhow!("server responded with {status}")),
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
