// ABOUTME: Route module organization for the Parley HTTP API
// ABOUTME: Assembles domain routers behind the auth gate and rate limiter, plus shared extractors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the Parley server
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the service layer. Successful responses use the
//! `{ "success": true, "data": ... }` envelope; failures are rendered by
//! `AppError`.

/// Caller identity route
pub mod auth;
/// Conversation and message routes
pub mod chat;
/// Health check and readiness routes
pub mod health;
/// Semantic search routes
pub mod search;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::{middleware, Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use auth::AuthRoutes;
pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use search::SearchRoutes;

use crate::errors::{AppError, AppResult};
use crate::middleware::{enforce_rate_limit, require_auth};
use crate::resources::ServerResources;

/// Success envelope shared by every data route
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `true`
    pub success: bool,
    /// Route payload
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap a payload in the success envelope
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// JSON body extractor whose rejections use the standard error envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| AppError::invalid_input(rejection.body_text()))
    }
}

/// Query string extractor whose rejections use the standard error envelope
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| AppError::invalid_input(rejection.body_text()))
    }
}

/// Parse a path segment as a resource id
///
/// # Errors
///
/// Returns invalid input when the segment is not a UUID
pub fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_input(format!("Invalid {what} id")))
}

/// Check a caller-supplied page size against `[1, max]`
///
/// # Errors
///
/// Returns an out-of-range error outside the bounds
pub fn check_limit(limit: i64, max: i64) -> AppResult<i64> {
    if (1..=max).contains(&limit) {
        Ok(limit)
    } else {
        Err(AppError::out_of_range(format!(
            "limit must be between 1 and {max}"
        )))
    }
}

/// Check a caller-supplied offset
///
/// # Errors
///
/// Returns an out-of-range error for negative offsets
pub fn check_offset(offset: i64) -> AppResult<i64> {
    if offset < 0 {
        Err(AppError::out_of_range("offset must not be negative"))
    } else {
        Ok(offset)
    }
}

/// All authenticated API routes
///
/// The general rate limiter runs first so unauthenticated floods are limited
/// too; the auth gate then attaches the caller to every request.
pub fn api_routes(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(ChatRoutes::routes(Arc::clone(resources)))
        .merge(SearchRoutes::routes(Arc::clone(resources)))
        .merge(AuthRoutes::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(resources),
            require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&resources.api_limiter),
            enforce_rate_limit,
        ))
}
