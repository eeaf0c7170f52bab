// ABOUTME: Environment-based server configuration for the Parley service
// ABOUTME: Loads network, embedding, identity, rate limit and CORS settings from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;
use std::str::FromStr;

use parley_core::constants::{embeddings, network, rate_limits};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::database::DatabaseConfig;
use crate::errors::{AppError, AppResult};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Identity provider configuration
    pub firebase: FirebaseConfig,
    /// Gateway rate limits
    pub rate_limit: RateLimitConfig,
    /// Cross-origin settings
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: network::DEFAULT_HOST.to_owned(),
            http_port: network::DEFAULT_HTTP_PORT,
            request_timeout_secs: network::DEFAULT_REQUEST_TIMEOUT_SECS,
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            firebase: FirebaseConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but malformed
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        Ok(Self {
            host: env_var_or("HOST", network::DEFAULT_HOST),
            http_port: parse_env("HTTP_PORT", network::DEFAULT_HTTP_PORT)?,
            request_timeout_secs: parse_env(
                "REQUEST_TIMEOUT_SECS",
                network::DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            database: DatabaseConfig::from_env()?,
            embedding: EmbeddingConfig::from_env()?,
            firebase: FirebaseConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            cors: CorsConfig::from_env(),
        })
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Parley Server Configuration:\n\
             - Bind: {}:{}\n\
             - Request Timeout: {}s\n\
             - Database: {} ({})\n\
             - Embedding Model: {} ({} dims, key {})\n\
             - Firebase Auth: {}\n\
             - Rate Limits: {} req/{}s (api), {} req/{}s (chat)\n\
             - CORS Origins: {}",
            self.host,
            self.http_port,
            self.request_timeout_secs,
            if self.database.url.is_sqlite() {
                "SQLite"
            } else {
                "PostgreSQL"
            },
            self.database.url,
            self.embedding.model,
            self.embedding.dimensions,
            if self.embedding.api_key.is_some() {
                "set"
            } else {
                "missing"
            },
            if self.firebase.is_configured() {
                "Enabled"
            } else {
                "Disabled"
            },
            self.rate_limit.api.max_requests,
            self.rate_limit.api.window_secs,
            self.rate_limit.chat.max_requests,
            self.rate_limit.chat.window_secs,
            self.cors.allowed_origins.join(", "),
        )
    }
}

/// OpenAI-compatible embedding endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Bearer credential for the embedding API
    pub api_key: Option<String>,
    /// Model name sent with every request
    pub model: String,
    /// API base URL (the client appends `/embeddings`)
    pub base_url: String,
    /// Expected vector length
    pub dimensions: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("dimensions", &self.dimensions)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: embeddings::DEFAULT_MODEL.to_owned(),
            base_url: embeddings::DEFAULT_BASE_URL.to_owned(),
            dimensions: embeddings::DEFAULT_DIMENSIONS,
            timeout_secs: embeddings::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EmbeddingConfig {
    /// Load embedding configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is malformed or the dimensionality is zero
    pub fn from_env() -> AppResult<Self> {
        let dimensions = parse_env("EMBEDDING_DIMENSIONS", embeddings::DEFAULT_DIMENSIONS)?;
        if dimensions == 0 {
            return Err(AppError::config("EMBEDDING_DIMENSIONS must be positive"));
        }

        Ok(Self {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env_var_or("EMBEDDING_MODEL", embeddings::DEFAULT_MODEL),
            base_url: env_var_or("EMBEDDING_BASE_URL", embeddings::DEFAULT_BASE_URL),
            dimensions,
            timeout_secs: parse_env("EMBEDDING_TIMEOUT_SECS", embeddings::DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

/// Firebase Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Firebase project ID (required for token validation)
    pub project_id: Option<String>,
    /// Whether Firebase authentication is enabled
    pub enabled: bool,
    /// Cache TTL for Firebase public keys in seconds (default: 3600 = 1 hour)
    pub key_cache_ttl_secs: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            enabled: false,
            key_cache_ttl_secs: 3600,
        }
    }
}

impl FirebaseConfig {
    /// Returns `true` if Firebase is enabled and has a project ID configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.enabled && self.project_id.is_some()
    }

    /// Load Firebase configuration from environment
    ///
    /// Enabled whenever `FIREBASE_PROJECT_ID` is set, unless `FIREBASE_AUTH_ENABLED=false`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed
    pub fn from_env() -> AppResult<Self> {
        let project_id = env::var("FIREBASE_PROJECT_ID")
            .ok()
            .filter(|p| !p.is_empty());
        let enabled = project_id.is_some() && parse_env("FIREBASE_AUTH_ENABLED", true)?;

        if enabled {
            info!(
                project_id = project_id.as_deref().unwrap_or("(not set)"),
                "Firebase authentication enabled"
            );
        }

        Ok(Self {
            project_id,
            enabled,
            key_cache_ttl_secs: parse_env("FIREBASE_KEY_CACHE_TTL_SECS", 3600)?,
        })
    }
}

/// A single fixed-window limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

/// Gateway rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Turn limiting off entirely (local development)
    pub enabled: bool,
    /// General API limiter applied to every authenticated route
    pub api: RateLimitRule,
    /// Additional limiter on message creation
    pub chat: RateLimitRule,
    /// Key clients by `X-Forwarded-For` instead of the peer address.
    /// Only safe behind a reverse proxy that overwrites the header.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api: RateLimitRule {
                max_requests: rate_limits::API_MAX_REQUESTS,
                window_secs: rate_limits::API_WINDOW_SECS,
            },
            chat: RateLimitRule {
                max_requests: rate_limits::CHAT_MAX_REQUESTS,
                window_secs: rate_limits::CHAT_WINDOW_SECS,
            },
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            enabled: parse_env("RATE_LIMIT_ENABLED", true)?,
            api: RateLimitRule {
                max_requests: parse_env("RATE_LIMIT_API_MAX", rate_limits::API_MAX_REQUESTS)?,
                window_secs: parse_env("RATE_LIMIT_API_WINDOW_SECS", rate_limits::API_WINDOW_SECS)?,
            },
            chat: RateLimitRule {
                max_requests: parse_env("RATE_LIMIT_CHAT_MAX", rate_limits::CHAT_MAX_REQUESTS)?,
                window_secs: parse_env(
                    "RATE_LIMIT_CHAT_WINDOW_SECS",
                    rate_limits::CHAT_WINDOW_SECS,
                )?,
            },
            trust_proxy_headers: parse_env("TRUST_PROXY_HEADERS", false)?,
        })
    }
}

/// Cross-origin resource sharing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

impl CorsConfig {
    /// Load CORS configuration from `CORS_ALLOWED_ORIGINS` (comma separated)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            allowed_origins: parse_origins(&env_var_or("CORS_ALLOWED_ORIGINS", "*")),
        }
    }

    /// Whether any origin is accepted
    #[must_use]
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {key} value '{value}': {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse comma-separated origins
fn parse_origins(origins: &str) -> Vec<String> {
    let parsed: Vec<String> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    if parsed.is_empty() {
        vec!["*".to_owned()]
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(parse_origins(" , "), vec!["*"]);
    }

    #[test]
    fn test_embedding_config_debug_redacts_key() {
        let config = EmbeddingConfig {
            api_key: Some("sk-live-secret".to_owned()),
            ..EmbeddingConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-live-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.api.max_requests, 100);
        assert_eq!(config.api.window_secs, 900);
        assert_eq!(config.chat.max_requests, 20);
        assert_eq!(config.chat.window_secs, 60);
    }
}
