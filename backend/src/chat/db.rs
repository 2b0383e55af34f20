//! Chat database operations
//!
//! SQLite implementation of [`ChatStore`].

use crate::chat::models::{
    now_millis, Conversation, ConversationPage, Message, MessageRow, Owner, PageCursor,
};
use crate::chat::store::{ChatStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

const CONVERSATION_COLUMNS: &str = "id, owner_id, title, visibility, created_at, updated_at";

/// Database connection pool for chat operations
pub struct ChatDb {
    pool: SqlitePool,
}

impl ChatDb {
    /// Initialize database connection pool and run migrations
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file (a `sqlite:` URL is accepted too)
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        if !db_path.starts_with("sqlite:") {
            if let Some(parent) = PathBuf::from(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_string = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            format!("sqlite:{}", db_path)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Connected to SQLite database at: {}", db_path);

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");

        let migration_sql = include_str!("../../migrations/001_create_chats.sql");

        // Comments are dropped line by line, then statements are split on ';'
        let mut cleaned_sql = String::new();
        for line in migration_sql.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            let without_comments = match trimmed.find("--") {
                Some(comment_pos) => &trimmed[..comment_pos],
                None => trimmed,
            };
            cleaned_sql.push_str(without_comments.trim());
            cleaned_sql.push(' ');
        }

        for statement in cleaned_sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ChatStore for ChatDb {
    async fn ensure_owner_exists(&self, owner: &Owner) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(&owner.id)
        .bind(&owner.email)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {} FROM conversations WHERE id = ?",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO conversations (id, owner_id, title, visibility, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(&conversation.id)
        .bind(&conversation.owner_id)
        .bind(&conversation.title)
        .bind(&conversation.visibility)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            debug!("Created conversation: {}", conversation.id);
        } else {
            debug!("Conversation {} already existed", conversation.id);
        }
        Ok(created)
    }

    async fn get_message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, role, parts, created_at FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Message::try_from).transpose()?)
    }

    async fn save_messages(&self, messages: &[Message]) -> Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut touched = BTreeSet::new();

        for message in messages {
            let parts = serde_json::to_string(&message.parts)?;
            let result = sqlx::query(
                "INSERT INTO messages (id, conversation_id, role, parts, created_at) \
                 VALUES (?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
            )
            .bind(&message.id)
            .bind(&message.conversation_id)
            .bind(message.role.as_str())
            .bind(parts)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(message_id = %message.id, "Message already stored, skipping");
            } else {
                touched.insert(message.conversation_id.as_str());
            }
        }

        let updated_at = now_millis();
        for conversation_id in &touched {
            sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
                .bind(updated_at)
                .bind(*conversation_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            count = messages.len(),
            conversations = touched.len(),
            "Saved messages"
        );
        Ok(())
    }

    async fn update_conversation_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("conversation {}", id)));
        }

        debug!("Updated title of conversation: {}", id);
        Ok(())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, role, parts, created_at FROM messages \
             WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Message::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_conversations(
        &self,
        owner_id: &str,
        limit: u32,
        cursor: &PageCursor,
    ) -> Result<ConversationPage, StoreError> {
        // One extra row tells whether another page exists
        let fetch = i64::from(limit) + 1;

        let mut conversations = match cursor {
            PageCursor::Latest => {
                sqlx::query_as::<_, Conversation>(&format!(
                    "SELECT {} FROM conversations WHERE owner_id = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                    CONVERSATION_COLUMNS
                ))
                .bind(owner_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            PageCursor::StartingAfter(cursor_id) => {
                let anchor = self
                    .get_conversation(cursor_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("conversation {}", cursor_id)))?;
                sqlx::query_as::<_, Conversation>(&format!(
                    "SELECT {} FROM conversations WHERE owner_id = ? \
                     AND (created_at < ? OR (created_at = ? AND id < ?)) \
                     ORDER BY created_at DESC, id DESC LIMIT ?",
                    CONVERSATION_COLUMNS
                ))
                .bind(owner_id)
                .bind(anchor.created_at)
                .bind(anchor.created_at)
                .bind(&anchor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            PageCursor::EndingBefore(cursor_id) => {
                let anchor = self
                    .get_conversation(cursor_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("conversation {}", cursor_id)))?;
                // Closest newer rows first, flipped back to newest-first below
                sqlx::query_as::<_, Conversation>(&format!(
                    "SELECT {} FROM conversations WHERE owner_id = ? \
                     AND (created_at > ? OR (created_at = ? AND id > ?)) \
                     ORDER BY created_at ASC, id ASC LIMIT ?",
                    CONVERSATION_COLUMNS
                ))
                .bind(owner_id)
                .bind(anchor.created_at)
                .bind(anchor.created_at)
                .bind(&anchor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let has_more = conversations.len() > limit as usize;
        conversations.truncate(limit as usize);
        if matches!(cursor, PageCursor::EndingBefore(_)) {
            conversations.reverse();
        }

        Ok(ConversationPage {
            conversations,
            has_more,
        })
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("conversation {}", id)));
        }

        debug!("Deleted conversation: {}", id);
        Ok(())
    }
}
