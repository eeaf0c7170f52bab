// ABOUTME: Main library entry point for the Parley conversation service
// ABOUTME: Conversation persistence with embedded messages and per-user semantic search over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Parley Server
//!
//! Backend for a chat client: it stores users, conversations and messages,
//! embeds every message at write time and answers semantic searches over the
//! caller's own messages.
//!
//! ## Architecture
//!
//! - **Store** (`database_plugins`): `SQLite` (vectors scored in process) or
//!   `PostgreSQL` with pgvector, behind one `DatabaseProvider` trait
//! - **Embeddings**: OpenAI-compatible client behind `EmbeddingProvider`
//! - **Services**: identity sync, conversation lifecycle, vector search
//! - **Gateway**: axum routes behind bearer-token verification and rate limits
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use parley_server::config::ServerConfig;
//! use parley_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("{}", config.summary());
//!     Ok(())
//! }
//! ```

/// Bearer token verification and the authenticated caller
pub mod auth;

/// Environment-based configuration
pub mod config;

/// Database abstraction with `SQLite` and `PostgreSQL` backends
pub mod database_plugins;

/// Text embedding providers
pub mod embeddings;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// HTTP middleware: auth gate, rate limiting, CORS, request tracing
pub mod middleware;

/// Domain models
pub mod models;

/// Shared server resources
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// HTTP server assembly and lifecycle
pub mod server;

/// Domain services
pub mod services;
