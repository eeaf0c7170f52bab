// ABOUTME: Fixed-window per-client rate limiting for HTTP requests
// ABOUTME: Rejects over-limit clients with 429 and reports quota through X-RateLimit headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Rate Limiting Middleware with HTTP Headers
//!
//! Each [`RateLimiter`] keeps one fixed window per client key. Clients are keyed
//! by the peer address, else `"anonymous"`. The first `x-forwarded-for` address
//! is used instead only when the limiter trusts proxy headers. Every response
//! carries the standard quota headers; rejected requests also carry `Retry-After`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use http::{HeaderMap, HeaderValue};
use tracing::warn;

use crate::config::RateLimitRule;
use crate::errors::AppError;

/// HTTP header names for rate limiting
pub mod headers {
    /// Maximum requests allowed in the current window
    pub const X_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    /// Remaining requests in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    /// Unix timestamp when the window resets
    pub const X_RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
    /// Seconds until the client may retry
    pub const RETRY_AFTER: &str = "Retry-After";
}

/// Client key used when no address is known
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Expired windows are swept once the map grows past this many clients
const PRUNE_THRESHOLD: usize = 10_000;

/// Longest supported window (one year)
const MAX_WINDOW_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Outcome of counting one request against a limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window resets, never negative
    #[must_use]
    pub fn retry_after_secs(&self) -> i64 {
        (self.reset_at - Utc::now()).num_seconds().max(0)
    }
}

/// Fixed-window request counter keyed by client
pub struct RateLimiter {
    rule: RateLimitRule,
    enabled: bool,
    trust_proxy_headers: bool,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Create a limiter; a disabled limiter admits everything
    #[must_use]
    pub fn new(rule: RateLimitRule, enabled: bool) -> Self {
        Self {
            rule,
            enabled,
            trust_proxy_headers: false,
            windows: DashMap::new(),
        }
    }

    /// Key clients by `x-forwarded-for` when set
    #[must_use]
    pub const fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// The configured limit
    #[must_use]
    pub const fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Count one request for `client` at the current time
    pub fn check(&self, client: &str) -> RateLimitDecision {
        self.check_at(client, Utc::now())
    }

    /// Count one request for `client` at `now`
    pub fn check_at(&self, client: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window_len = window_length(self.rule.window_secs);

        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                limit: self.rule.max_requests,
                remaining: self.rule.max_requests,
                reset_at: now + window_len,
            };
        }

        if self.windows.len() > PRUNE_THRESHOLD {
            self.windows
                .retain(|_, window| now < window.started_at + window_len);
        }

        let window = {
            let mut entry = self.windows.entry(client.to_owned()).or_insert(Window {
                started_at: now,
                count: 0,
            });
            if now >= entry.started_at + window_len {
                *entry = Window {
                    started_at: now,
                    count: 0,
                };
            }
            entry.count = entry.count.saturating_add(1);
            *entry
        };

        RateLimitDecision {
            allowed: window.count <= self.rule.max_requests,
            limit: self.rule.max_requests,
            remaining: self.rule.max_requests.saturating_sub(window.count),
            reset_at: window.started_at + window_len,
        }
    }
}

fn window_length(window_secs: u64) -> Duration {
    let secs = i64::try_from(window_secs).map_or(MAX_WINDOW_SECS, |s| s.min(MAX_WINDOW_SECS));
    Duration::seconds(secs)
}

/// Derive the client key from the peer address, or from `x-forwarded-for`
/// when `trust_proxy_headers` is set
#[must_use]
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    let forwarded = trust_proxy_headers
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_owned())
}

/// Create a `HeaderMap` with rate limit headers
#[must_use]
pub fn create_rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(headers::X_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    map.insert(
        headers::X_RATE_LIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
    map.insert(
        headers::X_RATE_LIMIT_RESET,
        HeaderValue::from(decision.reset_at.timestamp()),
    );
    if !decision.allowed {
        map.insert(
            headers::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs()),
        );
    }
    map
}

/// Axum middleware enforcing `limiter` on every request it wraps
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_key(request.headers(), peer, limiter.trust_proxy_headers);
    let decision = limiter.check(&client);
    let quota_headers = create_rate_limit_headers(&decision);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(client = %client, limit = decision.limit, "Rate limit exceeded");
        let rule = limiter.rule();
        AppError::rate_limit_exceeded(rule.max_requests, rule.window_secs).into_response()
    };

    response.headers_mut().extend(quota_headers);
    response
}
