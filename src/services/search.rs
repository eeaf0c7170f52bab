// ABOUTME: Vector search service ranking a caller's own messages by semantic similarity
// ABOUTME: Two entry points with distinct default thresholds over one ownership-scoped algorithm
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use parley_core::constants::search::{
    FIND_SIMILAR_LIMIT, FIND_SIMILAR_THRESHOLD, SEMANTIC_SEARCH_LIMIT, SEMANTIC_SEARCH_THRESHOLD,
};
use parley_core::models::RankedMessage;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store_failure;
use crate::database_plugins::{factory::Database, DatabaseProvider, MessageSearch};
use crate::embeddings::EmbeddingProvider;
use crate::errors::{AppError, AppResult};

const SEARCH_FAILED: &str = "Failed to perform semantic search";

/// Semantic search over messages in conversations the caller owns
#[derive(Clone)]
pub struct SearchService {
    database: Arc<Database>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl SearchService {
    /// Create the service; `embeddings` must be the provider used at ingestion
    #[must_use]
    pub fn new(database: Arc<Database>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            database,
            embeddings,
        }
    }

    /// General-purpose search, optionally restricted to one conversation
    ///
    /// Defaults: `limit` 5, `threshold` 0.5.
    ///
    /// # Errors
    ///
    /// Returns invalid input for a blank query or bad bounds, an external-service
    /// error when embedding fails, and a generic database error when the store fails
    pub async fn semantic_search(
        &self,
        query: &str,
        caller_id: Uuid,
        conversation_id: Option<Uuid>,
        limit: Option<i64>,
        threshold: Option<f64>,
    ) -> AppResult<Vec<RankedMessage>> {
        self.search(
            query,
            caller_id,
            conversation_id,
            limit.unwrap_or(SEMANTIC_SEARCH_LIMIT),
            threshold.unwrap_or(SEMANTIC_SEARCH_THRESHOLD),
        )
        .await
    }

    /// Stricter search for near-duplicates across all of the caller's conversations
    ///
    /// Defaults: `limit` 10, `threshold` 0.7.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`SearchService::semantic_search`]
    pub async fn find_similar(
        &self,
        query: &str,
        caller_id: Uuid,
        limit: Option<i64>,
        threshold: Option<f64>,
    ) -> AppResult<Vec<RankedMessage>> {
        self.search(
            query,
            caller_id,
            None,
            limit.unwrap_or(FIND_SIMILAR_LIMIT),
            threshold.unwrap_or(FIND_SIMILAR_THRESHOLD),
        )
        .await
    }

    #[instrument(skip(self, query))]
    async fn search(
        &self,
        query: &str,
        caller_id: Uuid,
        conversation_id: Option<Uuid>,
        limit: i64,
        threshold: f64,
    ) -> AppResult<Vec<RankedMessage>> {
        if query.trim().is_empty() {
            return Err(AppError::invalid_input("Search query is required"));
        }
        if limit < 1 {
            return Err(AppError::out_of_range("limit must be at least 1"));
        }
        if !threshold.is_finite() {
            return Err(AppError::out_of_range("threshold must be a finite number"));
        }

        let embedding = self.embeddings.embed(query).await?;

        let results = self
            .database
            .search_messages(MessageSearch {
                embedding: &embedding,
                owner_id: caller_id,
                conversation_id,
                threshold,
                limit,
            })
            .await
            .map_err(store_failure(SEARCH_FAILED))?;

        debug!(results = results.len(), "Semantic search complete");
        Ok(results)
    }
}
