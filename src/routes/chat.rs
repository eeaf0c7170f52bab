// ABOUTME: Chat route handlers for conversation and message management
// ABOUTME: Provides REST endpoints for creating, listing, archiving and messaging in conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! All handlers run behind the auth gate and act on behalf of the
//! authenticated caller. Message creation carries an extra rate limit.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Router};
use parley_core::constants::limits::{
    DEFAULT_CONVERSATION_PAGE, DEFAULT_MESSAGE_PAGE, MAX_PAGE_SIZE,
};
use parley_core::models::MessageRole;
use serde::Deserialize;
use tracing::info;

use super::search::SearchRequest;
use super::{check_limit, check_offset, parse_id, ApiJson, ApiQuery, ApiResponse};
use crate::auth::AuthenticatedUser;
use crate::errors::AppError;
use crate::middleware::enforce_rate_limit;
use crate::resources::ServerResources;

/// Request to create a new conversation
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    /// Conversation title
    #[serde(default)]
    pub title: Option<String>,
}

/// Request to archive or restore a conversation
#[derive(Debug, Deserialize)]
pub struct ArchiveConversationRequest {
    /// New archived flag
    #[serde(default = "default_archived")]
    pub archived: bool,
}

const fn default_archived() -> bool {
    true
}

/// Request to append a message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Message content
    #[serde(default)]
    pub content: String,
    /// `user`, `assistant` or `system` (defaults to `user`)
    #[serde(default)]
    pub message_type: Option<String>,
    /// Model that produced the message, if any
    #[serde(default)]
    pub model_used: Option<String>,
}

/// Paging query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Maximum number of items to return
    pub limit: Option<i64>,
    /// Number of items to skip
    pub offset: Option<i64>,
}

impl PageQuery {
    fn resolve(&self, default_limit: i64) -> Result<(i64, i64), AppError> {
        let limit = check_limit(self.limit.unwrap_or(default_limit), MAX_PAGE_SIZE)?;
        let offset = check_offset(self.offset.unwrap_or(0))?;
        Ok((limit, offset))
    }
}

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let chat_limit =
            middleware::from_fn_with_state(Arc::clone(&resources.chat_limiter), enforce_rate_limit);

        Router::new()
            // Conversation management
            .route(
                "/chat/conversations",
                post(Self::create_conversation).get(Self::list_conversations),
            )
            .route(
                "/chat/conversations/:conversation_id",
                get(Self::get_conversation),
            )
            .route(
                "/chat/conversations/:conversation_id/archive",
                post(Self::archive_conversation),
            )
            // Messages
            .route(
                "/chat/conversations/:conversation_id/messages",
                post(Self::send_message)
                    .route_layer(chat_limit)
                    .get(Self::get_messages),
            )
            // Search within chat, same contract as /search/messages
            .route("/chat/search", post(Self::search))
            .with_state(resources)
    }

    async fn create_conversation(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        ApiJson(request): ApiJson<CreateConversationRequest>,
    ) -> Result<Response, AppError> {
        let conversation = resources
            .conversations
            .create_conversation(user.id(), request.title)
            .await?;

        Ok((StatusCode::CREATED, ApiResponse::ok(conversation)).into_response())
    }

    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        ApiQuery(query): ApiQuery<PageQuery>,
    ) -> Result<Response, AppError> {
        let (limit, offset) = query.resolve(DEFAULT_CONVERSATION_PAGE)?;
        let conversations = resources
            .conversations
            .list_conversations(user.id(), limit, offset)
            .await?;

        Ok(ApiResponse::ok(conversations).into_response())
    }

    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let conversation_id = parse_id(&conversation_id, "conversation")?;
        let conversation = resources
            .conversations
            .get_conversation(user.id(), conversation_id)
            .await?;

        Ok(ApiResponse::ok(conversation).into_response())
    }

    async fn archive_conversation(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(conversation_id): Path<String>,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let conversation_id = parse_id(&conversation_id, "conversation")?;

        // An empty body means "archive"
        let archived = if body.iter().all(u8::is_ascii_whitespace) {
            true
        } else {
            serde_json::from_slice::<ArchiveConversationRequest>(&body)
                .map_err(|e| AppError::invalid_input(format!("Invalid request body: {e}")))?
                .archived
        };

        let conversation = resources
            .conversations
            .archive_conversation(user.id(), conversation_id, archived)
            .await?;

        Ok(ApiResponse::ok(conversation).into_response())
    }

    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(conversation_id): Path<String>,
        ApiJson(request): ApiJson<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let conversation_id = parse_id(&conversation_id, "conversation")?;
        let role = request
            .message_type
            .as_deref()
            .map(MessageRole::from_str)
            .transpose()?
            .unwrap_or_default();

        let message = resources
            .conversations
            .append_message(
                conversation_id,
                user.id(),
                &request.content,
                role,
                request.model_used,
            )
            .await?;

        info!(
            user_id = %user.id(),
            conversation_id = %conversation_id,
            role = %role,
            "Message appended"
        );
        Ok((StatusCode::CREATED, ApiResponse::ok(message)).into_response())
    }

    async fn get_messages(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(conversation_id): Path<String>,
        ApiQuery(query): ApiQuery<PageQuery>,
    ) -> Result<Response, AppError> {
        let conversation_id = parse_id(&conversation_id, "conversation")?;
        let (limit, offset) = query.resolve(DEFAULT_MESSAGE_PAGE)?;
        let messages = resources
            .conversations
            .list_messages(user.id(), conversation_id, limit, offset)
            .await?;

        Ok(ApiResponse::ok(messages).into_response())
    }

    async fn search(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        ApiJson(request): ApiJson<SearchRequest>,
    ) -> Result<Response, AppError> {
        let results = request.run(&resources, user.id()).await?;
        Ok(ApiResponse::ok(results).into_response())
    }
}
