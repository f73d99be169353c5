use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";

#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Failed to send reply: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Reply rejected with HTTP {status_code}: {message}")]
    Rejected { status_code: u16, message: String },
}

/// Sends reply text back to the user who triggered the event.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// Reply API client authorised by the channel access token
#[derive(Debug, Clone)]
pub struct LineReplyClient {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl LineReplyClient {
    pub fn new(access_token: String) -> Self {
        Self::with_endpoint(access_token, DEFAULT_REPLY_ENDPOINT.to_string())
    }

    pub fn with_endpoint(access_token: String, endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            access_token,
        }
    }
}

#[async_trait]
impl ReplyChannel for LineReplyClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let body = ReplyRequest {
            reply_token,
            messages: [TextMessage { kind: "text", text }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReplyError::Rejected {
                status_code: status.as_u16(),
                message,
            });
        }

        debug!(reply_token, "Reply delivered");
        Ok(())
    }
}
