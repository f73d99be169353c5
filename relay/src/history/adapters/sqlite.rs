//! SQLite-backed history store.
//!
//! One table holds every conversation. `id` is the insertion sequence and
//! orders records written within the same second.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use linegpt_core::{HistoryLimit, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::history::store::{ConversationRecord, HistoryError, HistoryStore};

/// Schema for the history database.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    role TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_history_chat_ts ON chat_history(chat_id, timestamp);
"#;

fn storage_error(context: &str) -> impl FnOnce(sqlx::Error) -> HistoryError + '_ {
    move |e| HistoryError::Storage(format!("{}: {}", context, e))
}

/// History store persisted in a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteHistoryStore {
    /// Open or create the history database.
    ///
    /// Creates the database file and parent directories if they don't exist.
    pub async fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HistoryError::Storage(format!(
                    "creating history directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(storage_error("connecting to history database"))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(storage_error("initializing history schema"))?;

        info!(path = %path.display(), "Opened history database");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Get the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Appends a record with an explicit timestamp.
    pub async fn append_at(
        &self,
        conversation_id: &str,
        timestamp: i64,
        role: Role,
        content: &str,
    ) -> Result<ConversationRecord, HistoryError> {
        let seq = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO chat_history (chat_id, timestamp, role, message)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(conversation_id)
        .bind(timestamp)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("inserting history record"))?;

        debug!(conversation_id, seq, "Appended history record");
        Ok(ConversationRecord {
            conversation_id: conversation_id.to_string(),
            timestamp,
            seq,
            role,
            content: content.to_string(),
        })
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ConversationRecord, HistoryError> {
    let corrupt = |e: sqlx::Error| HistoryError::CorruptRecord(e.to_string());
    let role: String = row.try_get("role").map_err(corrupt)?;

    Ok(ConversationRecord {
        conversation_id: row.try_get("chat_id").map_err(corrupt)?,
        timestamp: row.try_get("timestamp").map_err(corrupt)?,
        seq: row.try_get("id").map_err(corrupt)?,
        role: role
            .parse()
            .map_err(|e: linegpt_core::UnknownRole| HistoryError::CorruptRecord(e.to_string()))?,
        content: row.try_get("message").map_err(corrupt)?,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ConversationRecord, HistoryError> {
        self.append_at(conversation_id, Utc::now().timestamp(), role, content)
            .await
    }

    async fn recent_records(
        &self,
        conversation_id: &str,
        limit: HistoryLimit,
    ) -> Result<Vec<ConversationRecord>, HistoryError> {
        // SQLite treats a negative LIMIT as no limit.
        let sql_limit = limit
            .max_records()
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let rows = sqlx::query(
            r#"
            SELECT id, chat_id, timestamp, role, message
            FROM chat_history
            WHERE chat_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(sql_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetching recent history"))?;

        let mut records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }
}
