mod sqlite;

pub use sqlite::SqliteHistoryStore;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ ConversationSummary, Turn };

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("table `{table}` is missing columns {}; restart with --reset-db to recreate it", .missing.join(", "))]
    IncompatibleSchema { table: &'static str, missing: Vec<String> },
}

/// Conversation and turn persistence.
///
/// Every call stands alone: there is no transaction spanning two calls, and
/// concurrent writers to one conversation are not coordinated.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_conversation(&self) -> Result<String, StoreError>;

    /// Appends a turn, creating the conversation row first when the id is
    /// unknown so that client supplied ids are accepted.
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_message: &str,
        bot_response: &str
    ) -> Result<(), StoreError>;

    /// Turns in insertion order. Unknown and empty conversations both yield
    /// an empty list.
    async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError>;

    /// Most recently updated first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Returns whether a conversation row existed.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, StoreError>;
}

pub async fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, StoreError> {
    info!("Chat history will be stored in SQLite at {}", args.db_path);
    let store = SqliteHistoryStore::new(&args.db_path);
    if args.reset_db {
        store.reset_schema().await?;
    } else {
        store.init_schema().await?;
    }
    Ok(Arc::new(store))
}

/// Title derived from the first user message: its first 50 characters.
pub fn title_from_message(message: &str) -> String {
    message.chars().take(50).collect()
}
