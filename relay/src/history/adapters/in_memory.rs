use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use linegpt_core::{HistoryLimit, Role};
use tracing::debug;

use crate::history::store::{select_recent, ConversationRecord, HistoryError, HistoryStore};

#[derive(Debug, Default)]
struct Inner {
    next_seq: i64,
    conversations: HashMap<String, Vec<ConversationRecord>>,
}

/// In-memory implementation of HistoryStore
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    /// Thread-safe storage of conversation logs
    inner: RwLock<Inner>,
}

impl InMemoryHistoryStore {
    /// Create a new InMemoryHistoryStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record with an explicit timestamp.
    pub fn append_at(
        &self,
        conversation_id: &str,
        timestamp: i64,
        role: Role,
        content: &str,
    ) -> Result<ConversationRecord, HistoryError> {
        let mut inner = self.inner.write().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        inner.next_seq += 1;
        let record = ConversationRecord {
            conversation_id: conversation_id.to_string(),
            timestamp,
            seq: inner.next_seq,
            role,
            content: content.to_string(),
        };

        inner
            .conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(record.clone());
        debug!(conversation_id, seq = record.seq, "Appended history record");

        Ok(record)
    }

    /// Number of records stored for a conversation
    pub fn len(&self, conversation_id: &str) -> usize {
        self.inner
            .read()
            .map(|inner| inner.conversations.get(conversation_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, conversation_id: &str) -> bool {
        self.len(conversation_id) == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ConversationRecord, HistoryError> {
        self.append_at(conversation_id, Utc::now().timestamp(), role, content)
    }

    async fn recent_records(
        &self,
        conversation_id: &str,
        limit: HistoryLimit,
    ) -> Result<Vec<ConversationRecord>, HistoryError> {
        let inner = self.inner.read().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let records = inner
            .conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();

        Ok(select_recent(records, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linegpt_core::Message;
    use tokio::test;

    #[test]
    async fn test_recent_history_window() {
        let store = InMemoryHistoryStore::new();
        store.append_at("U1", 100, Role::User, "hi").unwrap();
        store.append_at("U1", 101, Role::Assistant, "hello").unwrap();
        store.append_at("U1", 102, Role::User, "how are you").unwrap();

        let history = store.recent_history("U1", HistoryLimit::Recent(2)).await.unwrap();
        assert_eq!(
            history,
            vec![Message::assistant("hello"), Message::user("how are you")]
        );

        let all = store.recent_history("U1", HistoryLimit::Unbounded).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], Message::user("hi"));
    }

    #[test]
    async fn test_unknown_conversation_is_empty() {
        let store = InMemoryHistoryStore::new();
        let history = store.recent_history("nobody", HistoryLimit::Recent(5)).await.unwrap();
        assert!(history.is_empty());
        assert!(store.is_empty("nobody"));
    }

    #[test]
    async fn test_conversations_are_isolated() {
        let store = InMemoryHistoryStore::new();
        store.append("G1", Role::User, "group message").await.unwrap();
        store.append("U1", Role::User, "direct message").await.unwrap();

        let group = store.recent_history("G1", HistoryLimit::Unbounded).await.unwrap();
        assert_eq!(group, vec![Message::user("group message")]);
        assert_eq!(store.len("U1"), 1);
    }

    #[test]
    async fn test_same_second_appends_keep_write_order() {
        let store = InMemoryHistoryStore::new();
        let user = store.append("U1", Role::User, "question").await.unwrap();
        let assistant = store.append("U1", Role::Assistant, "answer").await.unwrap();
        assert!(assistant.seq > user.seq);

        let history = store.recent_history("U1", HistoryLimit::Unbounded).await.unwrap();
        assert_eq!(
            history,
            vec![Message::user("question"), Message::assistant("answer")]
        );
    }
}
