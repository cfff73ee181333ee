use async_trait::async_trait;
use chrono::{ SecondsFormat, Utc };
use log::{ error, info, warn };
use rusqlite::{ params, Connection };
use std::path::{ Path, PathBuf };
use uuid::Uuid;
use crate::history::{ title_from_message, HistoryStore, StoreError };
use crate::models::chat::{ ConversationSummary, Turn, DEFAULT_CONVERSATION_TITLE };

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT 'New Conversation',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    user_message TEXT NOT NULL,
    bot_response TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, id);
"#;

const EXPECTED_COLUMNS: &[(&str, &[&str])] = &[
    ("conversations", &["id", "title", "created_at", "updated_at"]),
    ("messages", &["id", "conversation_id", "user_message", "bot_response", "timestamp"]),
];

const DROP_SCHEMA: &str = r#"
DROP TABLE IF EXISTS messages;
DROP TABLE IF EXISTS conversations;
"#;

/// SQLite backed store. Holds only the file path; each operation opens its
/// own connection on the blocking pool and drops it when done.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    path: PathBuf,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// First existing table that lacks one of the columns this store writes.
/// Tables that do not exist yet are skipped.
fn incompatible_table(conn: &Connection) -> rusqlite::Result<Option<(&'static str, Vec<String>)>> {
    for (table, expected) in EXPECTED_COLUMNS {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let present = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        if present.is_empty() {
            continue;
        }
        let missing: Vec<String> = expected
            .iter()
            .filter(|col| !present.iter().any(|p| p == *col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Ok(Some((*table, missing)));
        }
    }
    Ok(None)
}

impl SqliteHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn open(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
        where T: Send + 'static, F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static
    {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = Self::open(&path)?;
            op(&conn)
        }).await??;
        Ok(result)
    }

    /// Creates missing tables. Existing data is left untouched; an existing
    /// table with a different layout is refused rather than adopted.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        info!("Initializing conversation schema at {}", self.path.display());
        let conflict = self.with_connection(|conn| {
            if let Some(conflict) = incompatible_table(conn)? {
                return Ok(Some(conflict));
            }
            conn.execute_batch(SCHEMA)?;
            Ok(None)
        }).await?;

        match conflict {
            Some((table, missing)) => {
                error!("Existing table {} in {} has an incompatible layout", table, self.path.display());
                Err(StoreError::IncompatibleSchema { table, missing })
            }
            None => Ok(()),
        }
    }

    /// Drops both tables and recreates them empty.
    pub async fn reset_schema(&self) -> Result<(), StoreError> {
        warn!("Resetting conversation schema at {}; stored conversations are dropped", self.path.display());
        self.with_connection(|conn| {
            conn.execute_batch(DROP_SCHEMA)?;
            conn.execute_batch(SCHEMA)
        }).await
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create_conversation(&self) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conversation_id = id.clone();
        self.with_connection(move |conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![conversation_id, DEFAULT_CONVERSATION_TITLE, ts]
            )?;
            Ok(())
        }).await?;
        Ok(id)
    }

    async fn save_turn(
        &self,
        conversation_id: &str,
        user_message: &str,
        bot_response: &str
    ) -> Result<(), StoreError> {
        let conversation_id = conversation_id.to_string();
        let user_message = user_message.to_string();
        let bot_response = bot_response.to_string();

        self.with_connection(move |conn| {
            let ts = now();
            conn.execute(
                "INSERT OR IGNORE INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![conversation_id, DEFAULT_CONVERSATION_TITLE, ts]
            )?;
            conn.execute(
                "INSERT INTO messages (conversation_id, user_message, bot_response, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, user_message, bot_response, ts]
            )?;
            conn.execute(
                "UPDATE conversations
                 SET updated_at = ?1,
                     title = CASE WHEN title = ?2 THEN ?3 ELSE title END
                 WHERE id = ?4",
                params![ts, DEFAULT_CONVERSATION_TITLE, title_from_message(&user_message), conversation_id]
            )?;
            Ok(())
        }).await
    }

    async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError> {
        let conversation_id = conversation_id.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_message, bot_response, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY id ASC"
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(Turn {
                    user_message: row.get(0)?,
                    bot_response: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?;
            rows.collect()
        }).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.title, c.created_at, c.updated_at, COUNT(m.id)
                 FROM conversations c
                 LEFT JOIN messages m ON m.conversation_id = c.id
                 GROUP BY c.id
                 ORDER BY c.updated_at DESC, c.rowid DESC"
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ConversationSummary {
                    conversation_id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                    message_count: row.get(4)?,
                })
            })?;
            rows.collect()
        }).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, StoreError> {
        let conversation_id = conversation_id.to_string();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM messages WHERE conversation_id = ?1", params![conversation_id])?;
            let removed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![conversation_id])?;
            Ok(removed > 0)
        }).await
    }
}
