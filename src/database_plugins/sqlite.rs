// ABOUTME: SQLite implementation of the persistence store
// ABOUTME: Embeddings stored as JSON text and scored in-process after ownership filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `SQLite` database implementation
//!
//! `SQLite` has no vector operator, so semantic search loads the embeddings of
//! the caller's own messages and ranks them with
//! [`cosine_similarity`](super::shared::similarity::cosine_similarity).

use std::str::FromStr;

use async_trait::async_trait;
use parley_core::models::{Conversation, Message, NewMessage, RankedMessage, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::shared::mappers::{
    db_error, decode_embedding, encode_embedding, format_timestamp, get_column, parse_role,
    parse_timestamp, parse_uuid,
};
use super::shared::similarity::{cosine_similarity, rank};
use super::shared::transactions::SqliteTransactionGuard;
use super::{DatabaseProvider, MessageSearch, StoreOptions};
use crate::config::DatabaseUrl;
use crate::errors::{AppError, AppResult};

const USER_COLUMNS: &str = "id, external_id, email, display_name, avatar_url, provider, \
                            created_at, updated_at, last_login_at";
const CONVERSATION_COLUMNS: &str = "id, user_id, title, is_archived, created_at, updated_at";

/// `SQLite` database implementation
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    async fn ensure_parent_dir(database_url: &str) -> AppResult<()> {
        if let DatabaseUrl::SQLite { path } = DatabaseUrl::parse_url(database_url)? {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::config(format!(
                            "Cannot create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }

    fn user_from_row(row: &SqliteRow) -> AppResult<User> {
        Ok(User {
            id: parse_uuid(&get_column::<_, String>(row, "id")?)?,
            external_id: get_column(row, "external_id")?,
            email: get_column(row, "email")?,
            display_name: get_column(row, "display_name")?,
            avatar_url: get_column(row, "avatar_url")?,
            provider: get_column(row, "provider")?,
            created_at: parse_timestamp(&get_column::<_, String>(row, "created_at")?)?,
            updated_at: parse_timestamp(&get_column::<_, String>(row, "updated_at")?)?,
            last_login_at: parse_timestamp(&get_column::<_, String>(row, "last_login_at")?)?,
        })
    }

    fn conversation_from_row(row: &SqliteRow) -> AppResult<Conversation> {
        Ok(Conversation {
            id: parse_uuid(&get_column::<_, String>(row, "id")?)?,
            user_id: parse_uuid(&get_column::<_, String>(row, "user_id")?)?,
            title: get_column(row, "title")?,
            is_archived: get_column(row, "is_archived")?,
            created_at: parse_timestamp(&get_column::<_, String>(row, "created_at")?)?,
            updated_at: parse_timestamp(&get_column::<_, String>(row, "updated_at")?)?,
        })
    }

    fn message_from_row(row: &SqliteRow) -> AppResult<Message> {
        Ok(Message {
            id: parse_uuid(&get_column::<_, String>(row, "id")?)?,
            conversation_id: parse_uuid(&get_column::<_, String>(row, "conversation_id")?)?,
            user_id: parse_uuid(&get_column::<_, String>(row, "user_id")?)?,
            content: get_column(row, "content")?,
            role: parse_role(&get_column::<_, String>(row, "message_type")?)?,
            token_count: get_column(row, "token_count")?,
            model_used: get_column(row, "model_used")?,
            created_at: parse_timestamp(&get_column::<_, String>(row, "created_at")?)?,
        })
    }

    /// Score a candidate row against the query embedding
    fn ranked_from_row(row: &SqliteRow, query: &[f32]) -> AppResult<RankedMessage> {
        let stored = decode_embedding(&get_column::<_, String>(row, "content_embedding")?)?;
        Ok(RankedMessage {
            id: parse_uuid(&get_column::<_, String>(row, "id")?)?,
            content: get_column(row, "content")?,
            conversation_id: parse_uuid(&get_column::<_, String>(row, "conversation_id")?)?,
            created_at: parse_timestamp(&get_column::<_, String>(row, "created_at")?)?,
            similarity: cosine_similarity(query, &stored),
        })
    }
}

#[async_trait]
impl DatabaseProvider for SqliteDatabase {
    async fn new(database_url: &str, options: StoreOptions) -> AppResult<Self> {
        Self::ensure_parent_dir(database_url).await?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database; keep exactly one alive
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(db_error("Failed to connect to SQLite database"))?;

        info!("SQLite pool ready");
        Ok(Self { pool })
    }

    async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT,
                avatar_url TEXT,
                provider TEXT NOT NULL DEFAULT 'unknown',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_login_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                title TEXT,
                is_archived INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
                ON conversations(user_id, updated_at DESC)
            ",
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                user_id TEXT NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                message_type TEXT NOT NULL
                    CHECK (message_type IN ('user', 'assistant', 'system')),
                content_embedding TEXT,
                token_count INTEGER NOT NULL DEFAULT 0,
                model_used TEXT,
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                ON messages(conversation_id, created_at)
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to run SQLite migrations"))?;
        }

        debug!("SQLite schema up to date");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Database health check failed"))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get user"))?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn create_user(&self, user: &User) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO users (id, external_id, email, display_name, avatar_url, provider,
                               created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT(external_id) DO NOTHING
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.provider)
        .bind(format_timestamp(&user.created_at))
        .bind(format_timestamp(&user.updated_at))
        .bind(format_timestamp(&user.last_login_at))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create user"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_user_profile(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET display_name = $1, avatar_url = $2, updated_at = $3, last_login_at = $4
            WHERE id = $5
            ",
        )
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(format_timestamp(&user.updated_at))
        .bind(format_timestamp(&user.last_login_at))
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update user"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    async fn create_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, title, is_archived, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(conversation.id.to_string())
        .bind(conversation.user_id.to_string())
        .bind(&conversation.title)
        .bind(conversation.is_archived)
        .bind(format_timestamp(&conversation.created_at))
        .bind(format_timestamp(&conversation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create conversation"))?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1 AND user_id = $2"
        ))
        .bind(conversation_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get conversation"))?;

        row.as_ref().map(Self::conversation_from_row).transpose()
    }

    async fn list_conversations(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS} FROM conversations
            WHERE user_id = $1 AND is_archived = 0
            ORDER BY updated_at DESC, rowid DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(owner_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list conversations"))?;

        rows.iter().map(Self::conversation_from_row).collect()
    }

    async fn set_conversation_archived(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        archived: bool,
    ) -> AppResult<Option<Conversation>> {
        let result =
            sqlx::query("UPDATE conversations SET is_archived = $1 WHERE id = $2 AND user_id = $3")
                .bind(archived)
                .bind(conversation_id.to_string())
                .bind(owner_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to archive conversation"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_conversation(owner_id, conversation_id).await
    }

    async fn append_message(&self, message: &NewMessage) -> AppResult<()> {
        let embedding = encode_embedding(&message.embedding)?;
        let created_at = format_timestamp(&message.created_at);

        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;
        let mut guard = SqliteTransactionGuard::new(tx);

        let bumped =
            sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2 AND user_id = $3")
                .bind(&created_at)
                .bind(message.conversation_id.to_string())
                .bind(message.user_id.to_string())
                .execute(guard.executor()?)
                .await
                .map_err(db_error("Failed to update conversation timestamp"))?;

        if bumped.rows_affected() == 0 {
            guard.rollback().await?;
            return Err(AppError::not_found("Conversation"));
        }

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, user_id, content, message_type,
                                  content_embedding, token_count, model_used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.user_id.to_string())
        .bind(&message.content)
        .bind(message.role.as_str())
        .bind(&embedding)
        .bind(message.token_count)
        .bind(&message.model_used)
        .bind(&created_at)
        .execute(guard.executor()?)
        .await
        .map_err(db_error("Failed to insert message"))?;

        guard.commit().await
    }

    async fn list_messages(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT m.id, m.conversation_id, m.user_id, m.content, m.message_type,
                   m.token_count, m.model_used, m.created_at
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE m.conversation_id = $1 AND c.user_id = $2
            ORDER BY m.created_at ASC, m.rowid ASC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(conversation_id.to_string())
        .bind(owner_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list messages"))?;

        rows.iter().map(Self::message_from_row).collect()
    }

    async fn count_messages(&self, conversation_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM messages WHERE conversation_id = $1")
            .bind(conversation_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count messages"))?;
        get_column(&row, "total")
    }

    async fn search_messages(&self, search: MessageSearch<'_>) -> AppResult<Vec<RankedMessage>> {
        let conversation_filter = search.conversation_id.map(|id| id.to_string());

        let rows = sqlx::query(
            r"
            SELECT m.id, m.content, m.conversation_id, m.created_at, m.content_embedding
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.user_id = $1
              AND m.content_embedding IS NOT NULL
              AND ($2 IS NULL OR m.conversation_id = $2)
            ",
        )
        .bind(search.owner_id.to_string())
        .bind(conversation_filter)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load message embeddings"))?;

        let candidates = rows
            .iter()
            .map(|row| Self::ranked_from_row(row, search.embedding))
            .collect::<AppResult<Vec<_>>>()?;

        debug!(candidates = candidates.len(), "Scored candidate messages");
        let limit = usize::try_from(search.limit).unwrap_or(0);
        Ok(rank(candidates, search.threshold, limit))
    }
}
