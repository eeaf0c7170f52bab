// ABOUTME: Shared server resources assembled once at startup and handed to every route
// ABOUTME: Holds the database, collaborators, domain services, config and rate limiters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Centralized resource container
//!
//! Everything a request handler needs is built once here and shared through
//! `Arc<ServerResources>`, so no handler constructs its own pools or clients.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::ServerConfig;
use crate::database_plugins::factory::Database;
use crate::embeddings::EmbeddingProvider;
use crate::middleware::rate_limiting::RateLimiter;
use crate::services::{ConversationService, IdentityService, SearchService};

/// Shared state for all HTTP routes
pub struct ServerResources {
    /// Database handle, also used directly by readiness checks
    pub database: Arc<Database>,
    /// Bearer token verifier
    pub verifier: Arc<dyn TokenVerifier>,
    /// Identity provider to local user sync
    pub identity: IdentityService,
    /// Conversation and message lifecycle
    pub conversations: ConversationService,
    /// Semantic search
    pub search: SearchService,
    /// Limiter wrapping every API route
    pub api_limiter: Arc<RateLimiter>,
    /// Additional limiter on message creation
    pub chat_limiter: Arc<RateLimiter>,
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Wire services and limiters around the injected collaborators
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        embeddings: Arc<dyn EmbeddingProvider>,
        verifier: Arc<dyn TokenVerifier>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let rate_limit = &config.rate_limit;
        let api_limiter = Arc::new(
            RateLimiter::new(rate_limit.api, rate_limit.enabled)
                .trust_proxy_headers(rate_limit.trust_proxy_headers),
        );
        let chat_limiter = Arc::new(
            RateLimiter::new(rate_limit.chat, rate_limit.enabled)
                .trust_proxy_headers(rate_limit.trust_proxy_headers),
        );

        Self {
            identity: IdentityService::new(Arc::clone(&database)),
            conversations: ConversationService::new(
                Arc::clone(&database),
                Arc::clone(&embeddings),
            ),
            search: SearchService::new(Arc::clone(&database), embeddings),
            database,
            verifier,
            api_limiter,
            chat_limiter,
            config,
        }
    }
}
