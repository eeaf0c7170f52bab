// ABOUTME: Bearer token authentication middleware for the HTTP API
// ABOUTME: Verifies the token, syncs the local user and attaches it to the request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::tracing::record_user;
use crate::auth::{extract_bearer_token, AuthenticatedUser};
use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;

/// Require a verified bearer token on every wrapped route
///
/// Missing credentials yield 401, tokens the verifier rejects yield 403. On
/// success the synced user is available to handlers as
/// `Extension<AuthenticatedUser>`.
///
/// # Errors
///
/// Returns the verifier's error for rejected tokens and a generic error when the
/// user cannot be synced
pub async fn require_auth(
    State(resources): State<Arc<ServerResources>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_owned)
        .ok_or_else(|| {
            debug!("Authentication failed: missing bearer token");
            AppError::auth_required()
        })?;

    let identity = resources.verifier.verify(&token).await.map_err(|e| {
        warn!(code = ?e.code, "Token verification failed");
        e
    })?;

    let user = resources.identity.sync_user(&identity).await?;
    record_user(user.id);

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
