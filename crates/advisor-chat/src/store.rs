//! SQLite usage log and active-collection pointer.
//!
//! `chat_log` is append-only. The active collection lives in a keyed
//! `settings` row (`key = "DATABASE_CONFIG"`) whose value is nullable:
//! the row is created lazily with a null value on first read, and null
//! means "no collection configured" (maintenance mode).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::ChatStore;
use advisor_core::types::ChatRecord;

const ACTIVE_KEY: &str = "DATABASE_CONFIG";

pub struct SqliteChatStore {
    conn: Mutex<Connection>,
}

impl SqliteChatStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chat_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                processing_time REAL NOT NULL,
                input_word_count INTEGER NOT NULL,
                output_word_count INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                actor_identity TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                selected_db TEXT,
                update_time TEXT NOT NULL
            );",
        )
        .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| AdvisorError::ChatStore(e.to_string()))
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn append(&self, record: &ChatRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chat_log (question, answer, processing_time, input_word_count,
                                   output_word_count, timestamp, actor_identity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.question,
                record.answer,
                record.processing_time_seconds,
                record.input_word_count as i64,
                record.output_word_count as i64,
                record.timestamp.to_rfc3339(),
                record.actor_identity,
            ],
        )
        .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT question, answer, processing_time, input_word_count,
                        output_word_count, timestamp, actor_identity
                 FROM chat_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok(ChatRecord {
                    question: row.get(0)?,
                    answer: row.get(1)?,
                    processing_time_seconds: row.get(2)?,
                    input_word_count: row.get::<_, i64>(3)? as usize,
                    output_word_count: row.get::<_, i64>(4)? as usize,
                    timestamp: parse_timestamp(&row.get::<_, String>(5)?),
                    actor_identity: row.get(6)?,
                })
            })
            .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM chat_log", [], |r| r.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| AdvisorError::ChatStore(e.to_string()))
    }

    async fn get_active(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        let existing: rusqlite::Result<Option<String>> = conn.query_row(
            "SELECT selected_db FROM settings WHERE key = ?1",
            rusqlite::params![ACTIVE_KEY],
            |row| row.get(0),
        );
        match existing {
            Ok(value) => Ok(value.filter(|v| !v.is_empty())),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                conn.execute(
                    "INSERT INTO settings (key, selected_db, update_time) VALUES (?1, NULL, ?2)",
                    rusqlite::params![ACTIVE_KEY, Utc::now().to_rfc3339()],
                )
                .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
                Ok(None)
            }
            Err(e) => Err(AdvisorError::ChatStore(e.to_string())),
        }
    }

    async fn set_active(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, selected_db, update_time) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET selected_db = ?2, update_time = ?3",
            rusqlite::params![ACTIVE_KEY, name, Utc::now().to_rfc3339()],
        )
        .map_err(|e| AdvisorError::ChatStore(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_count(store: &SqliteChatStore) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM settings", [], |r| r.get(0)).unwrap()
    }

    #[tokio::test]
    async fn test_active_pointer_created_lazily_without_duplicates() {
        let store = SqliteChatStore::in_memory().unwrap();
        assert_eq!(row_count(&store), 0);
        assert_eq!(store.get_active().await.unwrap(), None);
        assert_eq!(row_count(&store), 1);
        // Second read must not add another row.
        assert_eq!(store.get_active().await.unwrap(), None);
        assert_eq!(row_count(&store), 1);
    }

    #[tokio::test]
    async fn test_set_then_get_active() {
        let store = SqliteChatStore::in_memory().unwrap();
        store.set_active("tuyensinh-2026").await.unwrap();
        assert_eq!(store.get_active().await.unwrap().as_deref(), Some("tuyensinh-2026"));
        store.set_active("tuyensinh-2027").await.unwrap();
        assert_eq!(store.get_active().await.unwrap().as_deref(), Some("tuyensinh-2027"));
        assert_eq!(row_count(&store), 1);
    }

    #[tokio::test]
    async fn test_append_recent_count() {
        let store = SqliteChatStore::in_memory().unwrap();
        for i in 0..3 {
            let record =
                ChatRecord::new(format!("câu hỏi {i}"), format!("trả lời {i}"), 0.5, "sv01");
            store.append(&record).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 3);

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].question, "câu hỏi 2");
        assert_eq!(recent[1].question, "câu hỏi 1");
        assert_eq!(recent[0].input_word_count, 3);
    }

    #[tokio::test]
    async fn test_records_survive_round_trip() {
        let store = SqliteChatStore::in_memory().unwrap();
        let record = ChatRecord::new("Học phí CNTT?", "15 triệu/năm.", 1.75, "khách");
        store.append(&record).await.unwrap();
        let got = &store.recent(1).await.unwrap()[0];
        assert_eq!(got.answer, "15 triệu/năm.");
        assert!((got.processing_time_seconds - 1.75).abs() < 1e-9);
        assert_eq!(got.actor_identity, "khách");
        assert_eq!(got.timestamp.date_naive(), record.timestamp.date_naive());
    }
}
