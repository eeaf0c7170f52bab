// ABOUTME: Persistence abstraction for users, conversations and embedded messages
// ABOUTME: Plugin architecture with SQLite and PostgreSQL (pgvector) backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use parley_core::constants::embeddings::DEFAULT_DIMENSIONS;
use parley_core::models::{Conversation, Message, NewMessage, RankedMessage, User};
use uuid::Uuid;

use crate::errors::AppResult;

pub mod factory;
pub mod shared;
pub mod sqlite;

#[cfg(feature = "postgresql")]
pub mod postgres;

/// Connection-time options shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Pool size (in-memory `SQLite` always uses a single connection)
    pub max_connections: u32,
    /// Dimensionality of the message embedding column
    pub vector_dimensions: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            vector_dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

/// Candidate restriction and cut-off for a vector search
#[derive(Debug, Clone, Copy)]
pub struct MessageSearch<'a> {
    /// Query embedding
    pub embedding: &'a [f32],
    /// Only messages in conversations owned by this user are candidates
    pub owner_id: Uuid,
    /// Further restrict candidates to one conversation
    pub conversation_id: Option<Uuid>,
    /// Keep similarity strictly greater than this
    pub threshold: f64,
    /// Maximum number of results
    pub limit: i64,
}

/// Core database abstraction trait
///
/// Every read and write that touches conversations or messages is scoped to an
/// owner; rows belonging to other users behave as if they did not exist.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + Clone {
    /// Create a new database connection pool
    async fn new(database_url: &str, options: StoreOptions) -> AppResult<Self>
    where
        Self: Sized;

    /// Run database migrations to set up schema
    async fn migrate(&self) -> AppResult<()>;

    /// Cheap round trip used by readiness checks
    async fn health_check(&self) -> AppResult<()>;

    /// Close the pool, waiting for checked-out connections
    async fn close(&self);

    // ================================
    // User Management
    // ================================

    /// Get user by the identity provider's uid
    async fn get_user_by_external_id(&self, external_id: &str) -> AppResult<Option<User>>;

    /// Insert a new user unless one with the same `external_id` already exists
    ///
    /// Returns `false` when the row was left untouched because of that conflict.
    async fn create_user(&self, user: &User) -> AppResult<bool>;

    /// Persist profile fields and login timestamps of an existing user
    async fn update_user_profile(&self, user: &User) -> AppResult<()>;

    // ================================
    // Conversations
    // ================================

    /// Insert a new conversation
    async fn create_conversation(&self, conversation: &Conversation) -> AppResult<()>;

    /// Get a conversation owned by `owner_id`
    async fn get_conversation(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Option<Conversation>>;

    /// Non-archived conversations of `owner_id`, most recently updated first
    async fn list_conversations(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversation>>;

    /// Set the archived flag; `None` when the conversation is not owned by `owner_id`
    async fn set_conversation_archived(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        archived: bool,
    ) -> AppResult<Option<Conversation>>;

    // ================================
    // Messages
    // ================================

    /// Insert a message and bump its conversation's `updated_at` in one transaction
    ///
    /// The bump is scoped to conversations owned by the message author; when it
    /// matches nothing the transaction is rolled back and a not-found error returned.
    async fn append_message(&self, message: &NewMessage) -> AppResult<()>;

    /// Messages of a conversation owned by `owner_id`, oldest first
    async fn list_messages(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>>;

    /// Number of stored messages in a conversation, regardless of owner
    async fn count_messages(&self, conversation_id: Uuid) -> AppResult<i64>;

    /// Rank the owner's embedded messages by cosine similarity to the query
    async fn search_messages(&self, search: MessageSearch<'_>) -> AppResult<Vec<RankedMessage>>;
}
