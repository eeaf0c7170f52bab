// ABOUTME: Re-export of the domain models from parley-core
// ABOUTME: Users, conversations, messages and ranked search results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use parley_core::models::{
    estimate_tokens, Conversation, Message, MessageRole, NewMessage, RankedMessage, User,
    VerifiedIdentity,
};
