//! Inbound webhook payloads from the LINE Messaging API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

/// Reasons an inbound delivery is rejected as a client error.
#[derive(Error, Debug)]
pub enum InboundError {
    #[error("Missing {SIGNATURE_HEADER} header")]
    MissingSignature,
    #[error("Webhook signature does not match the request body")]
    InvalidSignature,
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("Event source carries no group, room or user identifier")]
    MissingConversationId,
}

/// Top-level webhook body
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// A single webhook event. Only message events are acted on.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        /// Absent when the channel is in standby mode.
        #[serde(default)]
        reply_token: Option<String>,
        source: Source,
        message: MessageContent,
    },
    #[serde(other)]
    Other,
}

/// Message body of a message event
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Where an event originated
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

impl Source {
    /// Conversation key: group, then room, then user.
    pub fn conversation_id(&self) -> Result<&str, InboundError> {
        [&self.group_id, &self.room_id, &self.user_id]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|id| !id.is_empty())
            .ok_or(InboundError::MissingConversationId)
    }
}

/// A text message ready for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTurn {
    pub conversation_id: String,
    pub reply_token: String,
    pub text: String,
}

impl WebhookEvent {
    /// `None` for events and message kinds the relay does not answer.
    pub fn into_turn(self) -> Result<Option<InboundTurn>, InboundError> {
        match self {
            WebhookEvent::Message {
                reply_token: Some(reply_token),
                source,
                message: MessageContent::Text { text },
            } => Ok(Some(InboundTurn {
                conversation_id: source.conversation_id()?.to_string(),
                reply_token,
                text,
            })),
            WebhookEvent::Message {
                reply_token: None, ..
            } => Ok(None),
            WebhookEvent::Message {
                message: MessageContent::Other,
                ..
            } => Ok(None),
            WebhookEvent::Other => Ok(None),
        }
    }
}

/// Base64 HMAC-SHA256 of `body` keyed by the channel secret.
#[cfg(test)]
pub(crate) fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Checks the signature header against the raw body in constant time.
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), InboundError> {
    let signature = signature.ok_or(InboundError::MissingSignature)?;
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| InboundError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| InboundError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| InboundError::InvalidSignature)
}

/// Verifies and parses a webhook delivery.
pub fn parse_webhook(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookPayload, InboundError> {
    verify_signature(channel_secret, body, signature)?;
    Ok(serde_json::from_slice(body)?)
}
