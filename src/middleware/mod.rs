// ABOUTME: HTTP middleware for authentication, rate limiting, CORS and request tracing
// ABOUTME: Provides request ID generation, per-request spans and the bearer token gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod auth;
pub mod cors;
pub mod rate_limiting;
pub mod tracing;

// Authentication middleware
pub use auth::require_auth;

// CORS configuration
pub use cors::setup_cors;

// Rate limiting middleware and utilities
pub use rate_limiting::{
    client_key, create_rate_limit_headers, enforce_rate_limit, headers, RateLimiter,
};

// Request tracing
pub use self::tracing::{create_request_span, RequestIdGenerator, REQUEST_ID_HEADER};
