use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::{CompletionError, CompletionResult};
use crate::types::*;

/// Chat completion endpoint used when none is configured.
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Longest slice of an error body carried into `CompletionError::HttpStatus`.
const ERROR_BODY_EXCERPT: usize = 512;

/// Where and with which model completions are requested
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub model: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Anything that can turn an ordered message list into a reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn request_completion(
        &self,
        api_key: &str,
        messages: &[Message],
    ) -> CompletionResult<Message>;
}

/// Client for the chat completion API
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    settings: CompletionSettings,
}

impl CompletionClient {
    /// Create a new completion client
    pub fn new(settings: CompletionSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Builds the request body for the given ordered messages.
    pub fn build_request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
        }
    }

    /// Sends one completion request and returns the parsed response.
    ///
    /// Single attempt: retrying is left to the caller.
    pub async fn create_completion(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> CompletionResult<CompletionResponse> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Unavailable(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message: String = error_body.chars().take(ERROR_BODY_EXCERPT).collect();

            return Err(CompletionError::HttpStatus {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| CompletionError::Unavailable(format!("Failed to parse response: {}", e)))
    }

    /// Extracts the first choice's message from a response
    pub fn extract_reply(response: CompletionResponse) -> CompletionResult<Message> {
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(CompletionError::Empty)
    }
}

#[async_trait]
impl CompletionProvider for CompletionClient {
    async fn request_completion(
        &self,
        api_key: &str,
        messages: &[Message],
    ) -> CompletionResult<Message> {
        if messages.is_empty() {
            return Err(CompletionError::EmptyPrompt);
        }

        let request = self.build_request(messages);
        let response = self.create_completion(api_key, &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                id = %response.id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion received"
            );
        }

        Self::extract_reply(response)
    }
}
