// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, deterministic embedders, a static token verifier and users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `parley_server`
//!
//! External collaborators are replaced by deterministic doubles: embedders that
//! map text to known vectors and a verifier that accepts a fixed set of tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use async_trait::async_trait;
use parley_server::{
    auth::TokenVerifier,
    config::ServerConfig,
    database_plugins::{factory::Database, DatabaseProvider, StoreOptions},
    embeddings::{EmbeddingProvider, EMBEDDING_SERVICE},
    errors::{AppError, AppResult},
    models::{User, VerifiedIdentity},
    resources::ServerResources,
    services::IdentityService,
};

static INIT_LOGGER: Once = Once::new();

/// Token accepted for the first test user
pub const ALICE_TOKEN: &str = "alice-token";
/// Token accepted for the second test user
pub const BOB_TOKEN: &str = "bob-token";
/// Token the verifier reports as expired
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Fresh, migrated in-memory database
pub async fn create_test_database() -> Result<Arc<Database>> {
    create_test_database_with_dimensions(3).await
}

/// Fresh, migrated in-memory database for vectors of `dimensions`
pub async fn create_test_database_with_dimensions(dimensions: usize) -> Result<Arc<Database>> {
    init_test_logging();
    let options = StoreOptions {
        max_connections: 1,
        vector_dimensions: dimensions,
    };
    let database = Database::new("sqlite::memory:", options).await?;
    database.migrate().await?;
    Ok(Arc::new(database))
}

/// Identity assertion for a test user
pub fn identity(uid: &str) -> VerifiedIdentity {
    VerifiedIdentity::new(uid, format!("{uid}@example.com")).with_display_name(uid.to_uppercase())
}

/// Create (or refresh) a user through the identity sync service
pub async fn create_test_user(database: &Arc<Database>, uid: &str) -> Result<User> {
    let service = IdentityService::new(Arc::clone(database));
    Ok(service.sync_user(&identity(uid)).await?)
}

// ============================================================================
// Embedders
// ============================================================================

/// Returns a fixed vector per known text and `fallback` for anything else
pub struct KeyedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl KeyedEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_owned(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(*t)
                    .cloned()
                    .unwrap_or_else(|| self.fallback.clone())
            })
            .collect())
    }

    fn model(&self) -> &str {
        "keyed-test"
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }
}

/// Bag-of-words embedder: each distinct lowercase word gets its own axis
///
/// Cosine similarity between two texts is then the normalized word overlap.
pub struct VocabularyEmbedder {
    dimensions: usize,
    vocabulary: Mutex<HashMap<String, usize>>,
}

impl VocabularyEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vocabulary: Mutex::new(HashMap::new()),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let mut vocabulary = self.vocabulary.lock().unwrap();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(word).or_insert(next);
            assert!(axis < self.dimensions, "test vocabulary exhausted");
            vector[axis] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        "vocabulary-test"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder whose every call fails like an unreachable provider
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::external_service(
            EMBEDDING_SERVICE,
            "provider unavailable",
        ))
    }

    fn model(&self) -> &str {
        "failing-test"
    }

    fn dimensions(&self) -> usize {
        3
    }
}

// ============================================================================
// Token verification
// ============================================================================

/// Accepts `ALICE_TOKEN` and `BOB_TOKEN`; reports `EXPIRED_TOKEN` as expired
pub struct StaticTokenVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl Default for StaticTokenVerifier {
    fn default() -> Self {
        let identities = HashMap::from([
            (ALICE_TOKEN.to_owned(), identity("alice")),
            (BOB_TOKEN.to_owned(), identity("bob")),
        ]);
        Self { identities }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        if token == EXPIRED_TOKEN {
            return Err(AppError::auth_expired());
        }
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::auth_invalid("Invalid token"))
    }
}

/// Server resources over an in-memory database with the given embedder
pub async fn create_test_resources(
    embeddings: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<ServerResources>> {
    create_test_resources_with_config(embeddings, ServerConfig::default()).await
}

/// Server resources with a custom configuration (e.g. tight rate limits)
pub async fn create_test_resources_with_config(
    embeddings: Arc<dyn EmbeddingProvider>,
    config: ServerConfig,
) -> Result<Arc<ServerResources>> {
    let database = create_test_database_with_dimensions(embeddings.dimensions()).await?;
    Ok(Arc::new(ServerResources::new(
        database,
        embeddings,
        Arc::new(StaticTokenVerifier::default()),
        Arc::new(config),
    )))
}
