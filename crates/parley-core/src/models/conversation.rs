// ABOUTME: Conversation and message records for persistence and the HTTP API
// ABOUTME: Messages are append-only; embeddings travel only on the write path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::limits::CHARS_PER_TOKEN;
use crate::errors::AppError;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message written by the user
    #[default]
    User,
    /// Model response
    Assistant,
    /// System instruction
    System,
}

impl MessageRole {
    /// Convert to the string stored in the `message_type` column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(AppError::invalid_input(format!(
                "Invalid message type '{other}': expected user, assistant or system"
            ))),
        }
    }
}

/// A titled thread owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Optional title, stored as given
    pub title: Option<String>,
    /// Archived conversations are hidden from default listings
    pub is_archived: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last activity; bumped by every message append
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a fresh, unarchived conversation owned by `user_id`
    #[must_use]
    pub fn new(user_id: Uuid, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored utterance, as returned to callers (never includes the embedding)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID
    pub id: Uuid,
    /// Owning conversation
    pub conversation_id: Uuid,
    /// Author
    pub user_id: Uuid,
    /// Text content
    pub content: String,
    /// Origin of the message
    #[serde(rename = "message_type")]
    pub role: MessageRole,
    /// Approximate token count (`ceil(chars / 4)`)
    pub token_count: i64,
    /// Model that produced an assistant message
    pub model_used: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Write model for a message append, carrying the embedding computed at creation
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Message ID
    pub id: Uuid,
    /// Owning conversation
    pub conversation_id: Uuid,
    /// Author; must own the conversation
    pub user_id: Uuid,
    /// Text content
    pub content: String,
    /// Origin of the message
    pub role: MessageRole,
    /// Content embedding, computed once and never recomputed
    pub embedding: Vec<f32>,
    /// Approximate token count
    pub token_count: i64,
    /// Model that produced an assistant message
    pub model_used: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// The read model this write produces once persisted
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            content: self.content.clone(),
            role: self.role,
            token_count: self.token_count,
            model_used: self.model_used.clone(),
            created_at: self.created_at,
        }
    }
}

/// A message matched by semantic search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMessage {
    /// Message ID
    pub id: Uuid,
    /// Text content
    pub content: String,
    /// Owning conversation
    pub conversation_id: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// `1 - cosine_distance`; higher is more similar
    pub similarity: f64,
}

/// Coarse token estimate: character count divided by four, rounded up
///
/// Not a tokenizer count and not billing-accurate.
#[must_use]
pub fn estimate_tokens(content: &str) -> i64 {
    let chars = content.chars().count();
    i64::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(i64::MAX)
}
