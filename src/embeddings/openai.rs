// ABOUTME: OpenAI-compatible embedding client using the /embeddings endpoint
// ABOUTME: Reorders results by index and validates count and dimensionality; no retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{check_dimensions, prepare_text, EmbeddingProvider, EMBEDDING_SERVICE};
use crate::config::EmbeddingConfig;
use crate::errors::{AppError, AppResult};

/// Connection establishment timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Caller-facing failure text; provider detail stays in the error source
const REQUEST_FAILED: &str = "request failed";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Embedding client for `OpenAI` and API-compatible servers
pub struct OpenAiEmbeddings {
    client: Client,
    config: EmbeddingConfig,
}

impl OpenAiEmbeddings {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    fn add_auth_header(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_key {
            Some(ref api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<ApiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| parsed.error.message,
        );
        error!(%status, detail = %detail, "Embedding API returned an error");
        request_failed(AppError::external_service(
            EMBEDDING_SERVICE,
            format!("API error ({status}): {detail}"),
        ))
    }

    /// Put results back into input order and check they are 1:1 with the input
    fn order_by_index(mut data: Vec<EmbeddingData>, expected: usize) -> AppResult<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(AppError::external_service(
                EMBEDDING_SERVICE,
                format!("expected {expected} embeddings, got {}", data.len()),
            ));
        }

        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(AppError::external_service(
                EMBEDDING_SERVICE,
                "response indices do not match the request",
            ));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

fn request_failed(source: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::external_service(EMBEDDING_SERVICE, REQUEST_FAILED).with_source(source)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    #[instrument(skip(self, texts), fields(model = %self.config.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.iter().map(|t| prepare_text(t)).collect(),
        };

        let response = self
            .add_auth_header(self.client.post(self.endpoint()))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send embedding request: {e}");
                request_failed(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read embedding response: {e}");
            request_failed(e)
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse embedding response: {e}");
            request_failed(e)
        })?;

        let vectors = Self::order_by_index(parsed.data, texts.len())?;
        check_dimensions(&vectors, self.config.dimensions)?;

        debug!(count = vectors.len(), "Embeddings received");
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}
