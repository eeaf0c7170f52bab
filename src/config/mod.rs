// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Environment-only configuration split into typed per-concern structs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the Parley server
//!
//! - **Environment**: server, embedding, identity, rate limit and CORS settings
//! - **Database**: type-safe database URL and pool settings

/// Database configuration types
pub mod database;
/// Environment and server configuration
pub mod environment;

pub use database::{DatabaseConfig, DatabaseUrl};
pub use environment::{
    CorsConfig, EmbeddingConfig, FirebaseConfig, RateLimitConfig, RateLimitRule, ServerConfig,
};
