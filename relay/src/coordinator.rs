use crate::history::{ConversationRecord, HistoryStoreRef};
use crate::reply::{ReplyChannel, ReplyError};
use crate::webhook::InboundTurn;
use linegpt_core::{CompletionError, CompletionProvider, HistoryLimit, Message, ResolvedConfig, Role};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Process-wide values read once at start-up
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub system_prompt: String,
    pub api_key: String,
    pub history_limit: HistoryLimit,
}

impl From<&ResolvedConfig> for RelayContext {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            api_key: config.api_key.clone(),
            history_limit: config.history_limit,
        }
    }
}

/// Failures that stop a turn before the user gets a reply
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Failed to get response from completion endpoint: {0}")]
    Completion(#[from] CompletionError),
    #[error("Failed to deliver reply: {0}")]
    Reply(#[from] ReplyError),
}

/// How a successfully replied turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply sent and assistant turn stored
    Persisted,
    /// Reply sent but the assistant turn could not be stored
    PersistFailed,
}

/// Builds the prompt: system prompt, prior turns oldest first, then the current user turn.
///
/// `current` is the record written for this turn, if the write succeeded. It is
/// dropped from `history` so the user turn appears exactly once, at the end.
pub fn assemble_context(
    system_prompt: &str,
    history: Vec<ConversationRecord>,
    current: Option<&ConversationRecord>,
    user_text: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(
        history
            .iter()
            .filter(|record| current.map_or(true, |c| c.seq != record.seq))
            .map(ConversationRecord::to_message),
    );
    messages.push(Message::user(user_text));
    messages
}

/// Runs one user message through history, completion, reply and persistence.
#[derive(Clone)]
pub struct TurnOrchestrator {
    context: Arc<RelayContext>,
    history: HistoryStoreRef,
    completion: Arc<dyn CompletionProvider>,
    reply: Arc<dyn ReplyChannel>,
}

impl TurnOrchestrator {
    pub fn new(
        context: RelayContext,
        history: HistoryStoreRef,
        completion: Arc<dyn CompletionProvider>,
        reply: Arc<dyn ReplyChannel>,
    ) -> Self {
        Self {
            context: Arc::new(context),
            history,
            completion,
            reply,
        }
    }

    /// Process a single text message from the user
    pub async fn process_turn(&self, turn: &InboundTurn) -> Result<TurnOutcome, TurnError> {
        let conversation_id = turn.conversation_id.as_str();

        // Stored before the completion call so a failed call keeps the message.
        let current = match self.history.append(conversation_id, Role::User, &turn.text).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(conversation_id, error = %e, "Failed to store user turn, continuing");
                None
            }
        };

        let history = match self
            .history
            .recent_records(conversation_id, self.context.history_limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(conversation_id, error = %e, "Failed to read history, continuing without context");
                Vec::new()
            }
        };

        let messages = assemble_context(
            &self.context.system_prompt,
            history,
            current.as_ref(),
            &turn.text,
        );
        debug!(conversation_id, message_count = messages.len(), "Assembled prompt");

        let reply = self
            .completion
            .request_completion(&self.context.api_key, &messages)
            .await
            .map_err(|e| {
                error!(conversation_id, error = %e, "Completion failed");
                e
            })?;

        self.reply
            .reply_text(&turn.reply_token, &reply.content)
            .await
            .map_err(|e| {
                error!(conversation_id, error = %e, "Reply delivery failed");
                e
            })?;

        match self
            .history
            .append(conversation_id, Role::Assistant, &reply.content)
            .await
        {
            Ok(_) => {
                info!(conversation_id, "Turn completed");
                Ok(TurnOutcome::Persisted)
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "Failed to store assistant turn");
                Ok(TurnOutcome::PersistFailed)
            }
        }
    }
}
