// ABOUTME: User identity record and the verified identity assertion it is synced from
// ABOUTME: Users are keyed by the identity provider's stable uid and never deleted here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A caller's identity as stored by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID, referenced by conversations and messages
    pub id: Uuid,
    /// Stable identity-provider uid (unique)
    pub external_id: String,
    /// Email address (unique)
    pub email: String,
    /// Display name, if the provider supplied one
    pub display_name: Option<String>,
    /// Avatar URL, if the provider supplied one
    pub avatar_url: Option<String>,
    /// Sign-in provider that issued the identity (e.g. `google.com`, `password`)
    pub provider: String,
    /// When the user was first seen
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Last successful verification
    pub last_login_at: DateTime<Utc>,
}

/// Identity assertion produced by a token verifier
///
/// The gateway guarantees the assertion was cryptographically verified before it
/// reaches the identity sync service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Stable identity-provider uid
    pub external_id: String,
    /// Verified email address
    pub email: String,
    /// Display name claim
    pub display_name: Option<String>,
    /// Picture claim
    pub avatar_url: Option<String>,
    /// Sign-in provider claim
    pub provider: Option<String>,
}

impl VerifiedIdentity {
    /// Create an identity with only the mandatory claims
    pub fn new(external_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            email: email.into(),
            display_name: None,
            avatar_url: None,
            provider: None,
        }
    }

    /// Set the display name claim
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the picture claim
    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    /// Set the sign-in provider claim
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
