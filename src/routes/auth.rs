// ABOUTME: Caller identity route
// ABOUTME: Returns the authenticated user's uid, email and display name
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;

/// Public view of the caller
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    /// Identity-provider uid
    pub uid: String,
    /// Email address
    pub email: String,
    /// Display name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `GET /auth/me` response body
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    /// The authenticated caller
    pub user: UserInfo,
}

/// Authentication routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes() -> Router {
        Router::new().route("/auth/me", get(Self::me))
    }

    async fn me(
        Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ) -> Json<MeResponse> {
        Json(MeResponse {
            user: UserInfo {
                uid: user.external_id,
                email: user.email,
                name: user.display_name,
            },
        })
    }
}
