// ABOUTME: Bearer token verification seam between the HTTP gateway and the identity provider
// ABOUTME: Defines the TokenVerifier trait and the authenticated caller extension
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authentication
//!
//! The gateway never trusts a bearer token on its own: a [`TokenVerifier`]
//! turns it into a [`VerifiedIdentity`], which the identity service then syncs
//! into a local [`User`]. Production uses [`firebase::FirebaseAuth`]; tests plug
//! in static verifiers.

/// Firebase ID token verification
pub mod firebase;

pub use firebase::FirebaseAuth;

use async_trait::async_trait;
use parley_core::models::{User, VerifiedIdentity};

use crate::errors::AppResult;

/// Verifies bearer tokens issued by an external identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return the identity it asserts
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid`/`AuthExpired` for tokens that fail verification, and
    /// configuration or upstream errors when verification cannot be attempted
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity>;
}

/// The synced caller, attached to the request by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    /// Internal user id used to scope every store call
    #[must_use]
    pub const fn id(&self) -> uuid::Uuid {
        self.0.id
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively; an empty token counts as missing.
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
