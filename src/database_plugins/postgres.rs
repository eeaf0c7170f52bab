// ABOUTME: PostgreSQL implementation of the persistence store using pgvector
// ABOUTME: Native vector column with the <=> cosine-distance operator evaluated in SQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `PostgreSQL` database implementation
//!
//! Requires the `vector` extension. Similarity is `1 - (embedding <=> query)`;
//! the threshold, ordering and limit are all applied by the database.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::models::{Conversation, Message, NewMessage, RankedMessage, User};
use pgvector::Vector;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::shared::mappers::{db_error, get_column, parse_role};
use super::shared::transactions::PostgresTransactionGuard;
use super::{DatabaseProvider, MessageSearch, StoreOptions};
use crate::errors::{AppError, AppResult};

const USER_COLUMNS: &str = "id, external_id, email, display_name, avatar_url, provider, \
                            created_at, updated_at, last_login_at";
const CONVERSATION_COLUMNS: &str = "id, user_id, title, is_archived, created_at, updated_at";
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// `PostgreSQL` database implementation
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    vector_dimensions: usize,
}

impl PostgresDatabase {
    fn user_from_row(row: &PgRow) -> AppResult<User> {
        Ok(User {
            id: get_column(row, "id")?,
            external_id: get_column(row, "external_id")?,
            email: get_column(row, "email")?,
            display_name: get_column(row, "display_name")?,
            avatar_url: get_column(row, "avatar_url")?,
            provider: get_column(row, "provider")?,
            created_at: get_column(row, "created_at")?,
            updated_at: get_column(row, "updated_at")?,
            last_login_at: get_column(row, "last_login_at")?,
        })
    }

    fn conversation_from_row(row: &PgRow) -> AppResult<Conversation> {
        Ok(Conversation {
            id: get_column(row, "id")?,
            user_id: get_column(row, "user_id")?,
            title: get_column(row, "title")?,
            is_archived: get_column(row, "is_archived")?,
            created_at: get_column(row, "created_at")?,
            updated_at: get_column(row, "updated_at")?,
        })
    }

    fn message_from_row(row: &PgRow) -> AppResult<Message> {
        Ok(Message {
            id: get_column(row, "id")?,
            conversation_id: get_column(row, "conversation_id")?,
            user_id: get_column(row, "user_id")?,
            content: get_column(row, "content")?,
            role: parse_role(&get_column::<_, String>(row, "message_type")?)?,
            token_count: get_column(row, "token_count")?,
            model_used: get_column(row, "model_used")?,
            created_at: get_column(row, "created_at")?,
        })
    }

    fn ranked_from_row(row: &PgRow) -> AppResult<RankedMessage> {
        Ok(RankedMessage {
            id: get_column(row, "id")?,
            content: get_column(row, "content")?,
            conversation_id: get_column(row, "conversation_id")?,
            created_at: get_column(row, "created_at")?,
            similarity: get_column(row, "similarity")?,
        })
    }
}

#[async_trait]
impl DatabaseProvider for PostgresDatabase {
    async fn new(database_url: &str, options: StoreOptions) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect to PostgreSQL database"))?;

        info!(
            max_connections = options.max_connections,
            "PostgreSQL pool ready"
        );
        Ok(Self {
            pool,
            vector_dimensions: options.vector_dimensions,
        })
    }

    async fn migrate(&self) -> AppResult<()> {
        // Dimensions come from configuration, never from request input
        let messages_table = format!(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY,
                conversation_id UUID NOT NULL REFERENCES conversations(id),
                user_id UUID NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                message_type TEXT NOT NULL
                    CHECK (message_type IN ('user', 'assistant', 'system')),
                content_embedding vector({}),
                token_count BIGINT NOT NULL DEFAULT 0,
                model_used TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            self.vector_dimensions
        );

        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector",
            r"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT,
                avatar_url TEXT,
                provider TEXT NOT NULL DEFAULT 'unknown',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_login_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id),
                title TEXT,
                is_archived BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
                ON conversations(user_id, updated_at DESC)
            ",
            messages_table.as_str(),
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                ON messages(conversation_id, created_at)
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_embedding
                ON messages USING hnsw (content_embedding vector_cosine_ops)
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to run PostgreSQL migrations"))?;
        }

        debug!(
            dimensions = self.vector_dimensions,
            "PostgreSQL schema up to date"
        );
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
            ON CONFLICT (external_id) DO NOTHING
            ",
        )
        .bind(user.id)
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.provider)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
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
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .bind(user.id)
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
        .bind(conversation.id)
        .bind(conversation.user_id)
        .bind(&conversation.title)
        .bind(conversation.is_archived)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
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
        .bind(conversation_id)
        .bind(owner_id)
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
            WHERE user_id = $1 AND is_archived = FALSE
            ORDER BY updated_at DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(owner_id)
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
        let row = sqlx::query(&format!(
            r"
            UPDATE conversations SET is_archived = $1
            WHERE id = $2 AND user_id = $3
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(archived)
        .bind(conversation_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to archive conversation"))?;

        row.as_ref().map(Self::conversation_from_row).transpose()
    }

    async fn append_message(&self, message: &NewMessage) -> AppResult<()> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;
        let mut guard = PostgresTransactionGuard::new(tx);

        let bumped =
            sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2 AND user_id = $3")
                .bind(message.created_at)
                .bind(message.conversation_id)
                .bind(message.user_id)
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
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.role.as_str())
        .bind(Vector::from(message.embedding.clone()))
        .bind(message.token_count)
        .bind(&message.model_used)
        .bind(message.created_at)
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
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list messages"))?;

        rows.iter().map(Self::message_from_row).collect()
    }

    async fn count_messages(&self, conversation_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count messages"))?;
        get_column(&row, "total")
    }

    async fn search_messages(&self, search: MessageSearch<'_>) -> AppResult<Vec<RankedMessage>> {
        let rows = sqlx::query(
            r"
            SELECT m.id, m.content, m.conversation_id, m.created_at,
                   (1 - (m.content_embedding <=> $1))::float8 AS similarity
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.user_id = $2
              AND m.content_embedding IS NOT NULL
              AND ($3::uuid IS NULL OR m.conversation_id = $3)
              AND 1 - (m.content_embedding <=> $1) > $4
            ORDER BY m.content_embedding <=> $1 ASC
            LIMIT $5
            ",
        )
        .bind(Vector::from(search.embedding.to_vec()))
        .bind(search.owner_id)
        .bind(search.conversation_id)
        .bind(search.threshold)
        .bind(search.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search messages"))?;

        rows.iter().map(Self::ranked_from_row).collect()
    }
}
