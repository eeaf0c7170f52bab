// ABOUTME: Core data models for users, conversations, messages and search hits
// ABOUTME: Serializable DTOs shared by the store, the services and the HTTP layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Core data models
//!
//! Embedding vectors only ever appear on [`NewMessage`]; the read models
//! ([`Message`], [`RankedMessage`]) never carry them.

mod conversation;
mod user;

pub use conversation::{
    estimate_tokens, Conversation, Message, MessageRole, NewMessage, RankedMessage,
};
pub use user::{User, VerifiedIdentity};
