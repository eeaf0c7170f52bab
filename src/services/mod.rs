// ABOUTME: Domain service layer for identity sync, conversations and semantic search
// ABOUTME: Protocol-agnostic business rules shared by the HTTP routes and tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Services own validation and ownership rules and translate store failures into
//! generic, caller-safe errors. Route handlers only parse input and shape output.

/// Conversation and message lifecycle
pub mod conversations;

/// Identity provider to local user synchronization
pub mod identity;

/// Semantic search over a caller's own messages
pub mod search;

pub use conversations::ConversationService;
pub use identity::IdentityService;
pub use search::SearchService;

use tracing::error;

use crate::errors::{AppError, ErrorCode};

/// Replace store and internal failures with a generic message, keeping the original as source
///
/// Validation, not-found and upstream errors pass through unchanged.
fn store_failure(context: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |e| match e.code {
        ErrorCode::DatabaseError | ErrorCode::InternalError => {
            error!(error = %e, "{context}");
            AppError::database(context).with_source(e)
        }
        _ => e,
    }
}
