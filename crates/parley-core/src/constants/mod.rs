// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for search thresholds, paging limits and embedding defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single large file.

/// Semantic search defaults
pub mod search {
    /// Default similarity threshold for the general-purpose semantic search entry point
    pub const SEMANTIC_SEARCH_THRESHOLD: f64 = 0.5;
    /// Default result count for the general-purpose semantic search entry point
    pub const SEMANTIC_SEARCH_LIMIT: i64 = 5;
    /// Default similarity threshold for the "find similar" entry point
    pub const FIND_SIMILAR_THRESHOLD: f64 = 0.7;
    /// Default result count for the "find similar" entry point
    pub const FIND_SIMILAR_LIMIT: i64 = 10;
    /// Largest `limit` the gateway accepts on search requests
    pub const MAX_SEARCH_LIMIT: i64 = 50;
}

/// Paging defaults and bounds for listings
pub mod limits {
    /// Default page size when listing conversations
    pub const DEFAULT_CONVERSATION_PAGE: i64 = 20;
    /// Default page size when listing messages
    pub const DEFAULT_MESSAGE_PAGE: i64 = 50;
    /// Largest page size the gateway accepts on listings
    pub const MAX_PAGE_SIZE: i64 = 100;
    /// Maximum message length in characters
    pub const MAX_MESSAGE_CHARS: usize = 4000;
    /// Characters per estimated token
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Embedding provider defaults
pub mod embeddings {
    /// Default embedding model
    pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";
    /// Dimensionality of the default embedding model
    pub const DEFAULT_DIMENSIONS: usize = 1536;
    /// Default OpenAI-compatible API base URL
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    /// Default request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

/// Rate limiting defaults
pub mod rate_limits {
    /// General API limiter: requests per window
    pub const API_MAX_REQUESTS: u32 = 100;
    /// General API limiter: window length (15 minutes)
    pub const API_WINDOW_SECS: u64 = 15 * 60;
    /// Chat message limiter: requests per window
    pub const CHAT_MAX_REQUESTS: u32 = 20;
    /// Chat message limiter: window length (1 minute)
    pub const CHAT_WINDOW_SECS: u64 = 60;
}

/// Network defaults
pub mod network {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
    /// Default bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    /// Default request timeout for the whole HTTP request
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Service identity used in structured logs
pub mod service_names {
    /// Service name
    pub const PARLEY_SERVER: &str = "parley-server";
}

/// Identity provider defaults
pub mod identity {
    /// Provider name stored when the token does not carry one
    pub const UNKNOWN_PROVIDER: &str = "unknown";
}
