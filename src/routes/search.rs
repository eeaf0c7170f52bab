// ABOUTME: Semantic search route handlers over the caller's own messages
// ABOUTME: Exposes the general search (optionally per conversation) and the stricter similar-message search
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Router};
use parley_core::constants::search::MAX_SEARCH_LIMIT;
use parley_core::models::RankedMessage;
use serde::Deserialize;
use uuid::Uuid;

use super::{check_limit, ApiJson, ApiResponse};
use crate::auth::AuthenticatedUser;
use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;

/// Request for the general-purpose semantic search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text query
    #[serde(default)]
    pub query: String,
    /// Restrict results to one conversation
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Maximum results (1..=50, default 5)
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchRequest {
    pub(super) async fn run(
        self,
        resources: &ServerResources,
        caller_id: Uuid,
    ) -> AppResult<Vec<RankedMessage>> {
        let limit = self
            .limit
            .map(|limit| check_limit(limit, MAX_SEARCH_LIMIT))
            .transpose()?;

        resources
            .search
            .semantic_search(&self.query, caller_id, self.conversation_id, limit, None)
            .await
    }
}

/// Request for the near-duplicate search
#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    /// Free-text query
    #[serde(default)]
    pub query: String,
    /// Maximum results (1..=50, default 10)
    #[serde(default)]
    pub limit: Option<i64>,
    /// Similarity cut-off (default 0.7)
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Search routes handler
pub struct SearchRoutes;

impl SearchRoutes {
    /// Create all search routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/search/messages", post(Self::search_messages))
            .route("/search/similar", post(Self::find_similar))
            .with_state(resources)
    }

    async fn search_messages(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        ApiJson(request): ApiJson<SearchRequest>,
    ) -> Result<Response, AppError> {
        let results = request.run(&resources, user.id()).await?;
        Ok(ApiResponse::ok(results).into_response())
    }

    async fn find_similar(
        State(resources): State<Arc<ServerResources>>,
        Extension(user): Extension<AuthenticatedUser>,
        ApiJson(request): ApiJson<SimilarRequest>,
    ) -> Result<Response, AppError> {
        let limit = request
            .limit
            .map(|limit| check_limit(limit, MAX_SEARCH_LIMIT))
            .transpose()?;

        let results = resources
            .search
            .find_similar(&request.query, user.id(), limit, request.threshold)
            .await?;

        Ok(ApiResponse::ok(results).into_response())
    }
}
