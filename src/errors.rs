// ABOUTME: Re-export of the unified error types from parley-core
// ABOUTME: Keeps `crate::errors::*` paths stable for the server crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Error handling for the Parley server
//!
//! The error types live in `parley-core` so the core models can use them too.
//! `AppError` renders as `{ "success": false, "error": "<message>" }` with the
//! status code of its `ErrorCode`.

pub use parley_core::errors::{AppError, AppResult, ErrorCode, ErrorResponse};
