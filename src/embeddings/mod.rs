// ABOUTME: Embedding provider abstraction turning message text into fixed-length vectors
// ABOUTME: Shared text preparation and dimensionality checks used by every provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Embedding Providers
//!
//! The same provider must be used for ingestion and for queries; vectors from
//! different models are not comparable.

/// `OpenAI`-compatible `/embeddings` client
pub mod openai;

pub use openai::OpenAiEmbeddings;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};

/// Service name used in external-service errors
pub const EMBEDDING_SERVICE: &str = "Embedding provider";

/// Converts text into embedding vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts; output is 1:1 with and in the order of `texts`
    ///
    /// An empty batch returns an empty result without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns an external-service error when the provider fails or returns
    /// vectors of the wrong count or length
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a single text
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EmbeddingProvider::embed_batch`]
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::external_service(EMBEDDING_SERVICE, "empty response"))
    }

    /// Model identifier
    fn model(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;
}

/// Collapse line breaks (`\r\n`, `\n`, `\r`) into single spaces
#[must_use]
pub fn prepare_text(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Reject vectors whose length differs from the configured dimensionality
///
/// # Errors
///
/// Returns an external-service error naming both lengths
pub fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> AppResult<()> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(AppError::external_service(
            EMBEDDING_SERVICE,
            format!(
                "expected {expected}-dimensional embeddings, got {}",
                bad.len()
            ),
        ));
    }
    Ok(())
}
