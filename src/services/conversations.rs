// ABOUTME: Conversation service for creating, listing and archiving conversations
// ABOUTME: Appends messages with an embedding computed once, inside a single store transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::{Duration, Utc};
use parley_core::constants::limits::MAX_MESSAGE_CHARS;
use parley_core::models::{estimate_tokens, Conversation, Message, MessageRole, NewMessage};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::store_failure;
use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::embeddings::EmbeddingProvider;
use crate::errors::{AppError, AppResult};

/// Conversation and message lifecycle, always scoped to the caller
#[derive(Clone)]
pub struct ConversationService {
    database: Arc<Database>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl ConversationService {
    /// Create the service over a shared database and embedding provider
    #[must_use]
    pub fn new(database: Arc<Database>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            database,
            embeddings,
        }
    }

    /// Start a new conversation owned by `owner_id`
    ///
    /// Blank titles are stored as no title.
    ///
    /// # Errors
    ///
    /// Returns a generic database error if the insert fails
    pub async fn create_conversation(
        &self,
        owner_id: Uuid,
        title: Option<String>,
    ) -> AppResult<Conversation> {
        let title = title.filter(|t| !t.trim().is_empty());
        let conversation = Conversation::new(owner_id, title);

        self.database
            .create_conversation(&conversation)
            .await
            .map_err(store_failure("Failed to create conversation"))?;

        info!(user_id = %owner_id, conversation_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    /// Non-archived conversations of `owner_id`, most recently active first
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for negative paging values, or a generic
    /// database error if the query fails
    pub async fn list_conversations(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversation>> {
        check_paging(limit, offset)?;
        self.database
            .list_conversations(owner_id, limit, offset)
            .await
            .map_err(store_failure("Failed to get conversations"))
    }

    /// A single conversation owned by `owner_id`
    ///
    /// # Errors
    ///
    /// Returns a not-found error when the conversation is missing or owned by someone else
    pub async fn get_conversation(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Conversation> {
        self.database
            .get_conversation(owner_id, conversation_id)
            .await
            .map_err(store_failure("Failed to get conversation"))?
            .ok_or_else(|| AppError::not_found("Conversation"))
    }

    /// Archive or restore a conversation
    ///
    /// # Errors
    ///
    /// Returns a not-found error when the conversation is missing or owned by someone else
    pub async fn archive_conversation(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        archived: bool,
    ) -> AppResult<Conversation> {
        let conversation = self
            .database
            .set_conversation_archived(owner_id, conversation_id, archived)
            .await
            .map_err(store_failure("Failed to archive conversation"))?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        info!(user_id = %owner_id, conversation_id = %conversation_id, archived, "Conversation archive flag set");
        Ok(conversation)
    }

    /// Append a message, embedding its content first
    ///
    /// Nothing is written unless validation, the ownership check and the
    /// embedding call all succeed. The insert and the conversation's
    /// `updated_at` bump commit together or not at all.
    ///
    /// # Errors
    ///
    /// - invalid input for blank or over-long content
    /// - not found when `author_id` does not own the conversation
    /// - external service error when embedding fails
    /// - generic database error when the store fails
    #[instrument(skip(self, content, model_used))]
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        author_id: Uuid,
        content: &str,
        role: MessageRole,
        model_used: Option<String>,
    ) -> AppResult<Message> {
        validate_content(content)?;

        let conversation = self.get_conversation(author_id, conversation_id).await?;

        let embedding = self.embeddings.embed(content).await.map_err(|e| {
            warn!(error = %e, "Embedding failed; message not stored");
            e
        })?;

        // Keep updated_at strictly increasing at microsecond precision
        let created_at = Utc::now().max(conversation.updated_at + Duration::microseconds(1));

        let message = NewMessage {
            id: Uuid::new_v4(),
            conversation_id,
            user_id: author_id,
            content: content.to_owned(),
            role,
            embedding,
            token_count: estimate_tokens(content),
            model_used: model_used.filter(|m| !m.trim().is_empty()),
            created_at,
        };

        self.database
            .append_message(&message)
            .await
            .map_err(store_failure("Failed to add message"))?;

        info!(message_id = %message.id, token_count = message.token_count, "Message stored");
        Ok(message.to_message())
    }

    /// Messages of a conversation, oldest first
    ///
    /// Conversations not owned by `owner_id` yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for negative paging values, or a generic
    /// database error if the query fails
    pub async fn list_messages(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        check_paging(limit, offset)?;
        self.database
            .list_messages(owner_id, conversation_id, limit, offset)
            .await
            .map_err(store_failure("Failed to get messages"))
    }
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::invalid_input("Message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::invalid_input(format!(
            "Message content must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_paging(limit: i64, offset: i64) -> AppResult<()> {
    if limit < 0 || offset < 0 {
        return Err(AppError::out_of_range(
            "limit and offset must not be negative",
        ));
    }
    Ok(())
}
