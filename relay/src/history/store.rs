use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use linegpt_core::{HistoryLimit, Message, Role};

/// Error type for history store operations
#[derive(Debug)]
pub enum HistoryError {
    /// The backing store rejected or failed the operation
    Storage(String),
    /// A stored row could not be turned back into a record
    CorruptRecord(String),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Storage(msg) => write!(f, "Storage error: {}", msg),
            HistoryError::CorruptRecord(msg) => write!(f, "Corrupt history record: {}", msg),
        }
    }
}

impl Error for HistoryError {}

/// One persisted turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    /// Conversation the turn belongs to
    pub conversation_id: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// Store-assigned insertion sequence, breaks timestamp ties
    pub seq: i64,
    pub role: Role,
    pub content: String,
}

impl ConversationRecord {
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }

    fn sort_key(&self) -> (i64, i64) {
        (self.timestamp, self.seq)
    }
}

/// Picks the `limit` most recent records and returns them oldest first.
///
/// Input order does not matter.
pub fn select_recent(
    mut records: Vec<ConversationRecord>,
    limit: HistoryLimit,
) -> Vec<ConversationRecord> {
    records.sort_by_key(|r| std::cmp::Reverse(r.sort_key()));
    if let Some(max) = limit.max_records() {
        records.truncate(max);
    }
    records.reverse();
    records
}

/// Append-only, per-conversation log of turns
#[async_trait]
pub trait HistoryStore: Send + Sync + Debug {
    /// Writes one record stamped with the current time and returns it as stored.
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ConversationRecord, HistoryError>;

    /// Up to `limit` most recent records, oldest first. Unknown conversations yield an empty list.
    async fn recent_records(
        &self,
        conversation_id: &str,
        limit: HistoryLimit,
    ) -> Result<Vec<ConversationRecord>, HistoryError>;

    /// Same window as `recent_records`, reduced to messages.
    async fn recent_history(
        &self,
        conversation_id: &str,
        limit: HistoryLimit,
    ) -> Result<Vec<Message>, HistoryError> {
        let records = self.recent_records(conversation_id, limit).await?;
        Ok(records.iter().map(ConversationRecord::to_message).collect())
    }
}

/// Type alias for Arc-wrapped HistoryStore trait objects
pub type HistoryStoreRef = Arc<dyn HistoryStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: i64, seq: i64, role: Role, content: &str) -> ConversationRecord {
        ConversationRecord {
            conversation_id: "U1".to_string(),
            timestamp,
            seq,
            role,
            content: content.to_string(),
        }
    }

    fn contents(records: &[ConversationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn test_select_recent_orders_oldest_first() {
        let scrambled = vec![
            record(102, 3, Role::User, "how are you"),
            record(100, 1, Role::User, "hi"),
            record(101, 2, Role::Assistant, "hello"),
        ];

        let selected = select_recent(scrambled, HistoryLimit::Unbounded);
        assert_eq!(contents(&selected), vec!["hi", "hello", "how are you"]);
    }

    #[test]
    fn test_select_recent_bounds_to_latest() {
        let records = vec![
            record(100, 1, Role::User, "hi"),
            record(101, 2, Role::Assistant, "hello"),
            record(102, 3, Role::User, "how are you"),
        ];

        let selected = select_recent(records, HistoryLimit::Recent(2));
        let messages: Vec<Message> = selected.iter().map(ConversationRecord::to_message).collect();
        assert_eq!(
            messages,
            vec![Message::assistant("hello"), Message::user("how are you")]
        );
    }

    #[test]
    fn test_select_recent_limit_larger_than_history() {
        let records = vec![record(100, 1, Role::User, "hi")];
        let selected = select_recent(records, HistoryLimit::Recent(10));
        assert_eq!(contents(&selected), vec!["hi"]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let records = vec![
            record(200, 8, Role::Assistant, "answer"),
            record(200, 7, Role::User, "question"),
            record(199, 6, Role::User, "earlier"),
        ];

        let selected = select_recent(records, HistoryLimit::Recent(2));
        assert_eq!(contents(&selected), vec!["question", "answer"]);
    }

    #[test]
    fn test_select_recent_empty() {
        assert!(select_recent(Vec::new(), HistoryLimit::Recent(3)).is_empty());
    }
}
