// ABOUTME: Integration tests for mirroring verified identities into local users
// ABOUTME: Covers first-sight creation, idempotent refresh and profile field preservation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use parley_server::{errors::ErrorCode, models::VerifiedIdentity, services::IdentityService};

#[tokio::test]
async fn test_first_sight_creates_user() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(Arc::clone(&database));

    let identity = VerifiedIdentity::new("firebase-uid-1", "ada@example.com")
        .with_display_name("Ada")
        .with_avatar_url("https://example.com/ada.png")
        .with_provider("google.com");
    let user = service.sync_user(&identity).await?;

    assert_eq!(user.external_id, "firebase-uid-1");
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.display_name.as_deref(), Some("Ada"));
    assert_eq!(user.avatar_url.as_deref(), Some("https://example.com/ada.png"));
    assert_eq!(user.provider, "google.com");
    assert_eq!(user.created_at, user.last_login_at);

    let stored = service
        .get_user_by_external_id("firebase-uid-1")
        .await?
        .expect("user persisted");
    assert_eq!(stored, user);
    Ok(())
}

#[tokio::test]
async fn test_missing_provider_defaults_to_unknown() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(database);

    let user = service
        .sync_user(&VerifiedIdentity::new("uid-2", "grace@example.com"))
        .await?;
    assert_eq!(user.provider, "unknown");
    assert!(user.display_name.is_none());
    Ok(())
}

#[tokio::test]
async fn test_repeat_sync_keeps_identity_and_refreshes_login() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(database);

    let first = service
        .sync_user(
            &VerifiedIdentity::new("uid-3", "linus@example.com")
                .with_display_name("Linus")
                .with_avatar_url("https://example.com/old.png"),
        )
        .await?;

    // Empty profile fields never erase stored values
    let second = service
        .sync_user(&VerifiedIdentity::new("uid-3", "linus@example.com").with_display_name(""))
        .await?;
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.display_name.as_deref(), Some("Linus"));
    assert_eq!(second.avatar_url.as_deref(), Some("https://example.com/old.png"));
    assert!(second.last_login_at > first.last_login_at);
    assert!(second.updated_at > first.updated_at);

    let third = service
        .sync_user(
            &VerifiedIdentity::new("uid-3", "linus@example.com")
                .with_display_name("Linus T.")
                .with_avatar_url("https://example.com/new.png"),
        )
        .await?;
    assert_eq!(third.id, first.id);
    assert_eq!(third.display_name.as_deref(), Some("Linus T."));
    assert_eq!(third.avatar_url.as_deref(), Some("https://example.com/new.png"));

    let stored = service.get_user_by_external_id("uid-3").await?.unwrap();
    assert_eq!(stored, third);
    Ok(())
}

#[tokio::test]
async fn test_identity_without_email_is_rejected() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(database);

    let err = service
        .sync_user(&VerifiedIdentity::new("uid-4", "  "))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(service.get_user_by_external_id("uid-4").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_email_collision_is_a_generic_store_error() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(database);

    service
        .sync_user(&VerifiedIdentity::new("uid-5", "shared@example.com"))
        .await?;
    let err = service
        .sync_user(&VerifiedIdentity::new("uid-6", "shared@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DatabaseError);
    assert_eq!(err.message, "Failed to sync identity");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_logins_share_one_user() -> Result<()> {
    let database = common::create_test_database().await?;
    let service = IdentityService::new(database);
    let identity = VerifiedIdentity::new("uid-7", "parallel@example.com").with_display_name("Par");

    let (a, b) = tokio::join!(service.sync_user(&identity), service.sync_user(&identity));
    let (a, b) = (a?, b?);
    assert_eq!(a.id, b.id);
    assert_eq!(a.created_at, b.created_at);

    let stored = service.get_user_by_external_id("uid-7").await?.unwrap();
    assert_eq!(stored.id, a.id);
    assert_eq!(stored.display_name.as_deref(), Some("Par"));
    Ok(())
}
