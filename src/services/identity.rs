// ABOUTME: Identity sync service mirroring verified identity-provider users into the store
// ABOUTME: Creates users on first sight and refreshes profile and login time afterwards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use chrono::{Duration, Utc};
use parley_core::constants::identity::UNKNOWN_PROVIDER;
use parley_core::models::{User, VerifiedIdentity};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::errors::{AppError, AppResult};

const SYNC_FAILED: &str = "Failed to sync identity";

/// Keeps the local `users` table in step with the identity provider
#[derive(Clone)]
pub struct IdentityService {
    database: Arc<Database>,
}

impl IdentityService {
    /// Create the service over a shared database
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Create or refresh the local user for a verified identity
    ///
    /// New users get a fresh internal id. Existing users keep their id and
    /// creation time; display name and avatar are replaced only by non-empty
    /// values, and `updated_at` / `last_login_at` move to now.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for an identity without uid or email, and a
    /// generic database error when the store fails
    #[instrument(skip(self, identity), fields(external_id = %identity.external_id))]
    pub async fn sync_user(&self, identity: &VerifiedIdentity) -> AppResult<User> {
        if identity.external_id.trim().is_empty() || identity.email.trim().is_empty() {
            return Err(AppError::invalid_input(
                "Verified identity must carry a uid and an email",
            ));
        }

        let existing = self
            .database
            .get_user_by_external_id(&identity.external_id)
            .await
            .map_err(sync_failure)?;
        if let Some(user) = existing {
            return self.refresh(user, identity).await;
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            external_id: identity.external_id.clone(),
            email: identity.email.clone(),
            display_name: non_empty(identity.display_name.as_deref()).map(str::to_owned),
            avatar_url: non_empty(identity.avatar_url.as_deref()).map(str::to_owned),
            provider: non_empty(identity.provider.as_deref())
                .unwrap_or(UNKNOWN_PROVIDER)
                .to_owned(),
            created_at: now,
            updated_at: now,
            last_login_at: now,
        };

        let inserted = self
            .database
            .create_user(&user)
            .await
            .map_err(sync_failure)?;
        if inserted {
            info!(
                user_id = %user.id,
                provider = %user.provider,
                "Created user from verified identity"
            );
            return Ok(user);
        }

        // A concurrent first login created the row between our read and insert
        debug!("User created concurrently, refreshing instead");
        let winner = self
            .database
            .get_user_by_external_id(&identity.external_id)
            .await
            .map_err(sync_failure)?
            .ok_or_else(|| sync_failure(AppError::not_found("User")))?;
        self.refresh(winner, identity).await
    }

    async fn refresh(&self, mut user: User, identity: &VerifiedIdentity) -> AppResult<User> {
        if let Some(name) = non_empty(identity.display_name.as_deref()) {
            user.display_name = Some(name.to_owned());
        }
        if let Some(avatar) = non_empty(identity.avatar_url.as_deref()) {
            user.avatar_url = Some(avatar.to_owned());
        }
        // Microsecond step survives TIMESTAMPTZ precision
        let now = Utc::now().max(user.updated_at + Duration::microseconds(1));
        user.updated_at = now;
        user.last_login_at = now;

        self.database
            .update_user_profile(&user)
            .await
            .map_err(sync_failure)?;
        debug!(user_id = %user.id, "Refreshed existing user");
        Ok(user)
    }

    /// Look up a user by the identity provider's uid
    ///
    /// # Errors
    ///
    /// Returns a database error if the store fails
    pub async fn get_user_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        self.database.get_user_by_external_id(external_id).await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn sync_failure(e: AppError) -> AppError {
    error!(error = %e, "{SYNC_FAILED}");
    AppError::database(SYNC_FAILED).with_source(e)
}
