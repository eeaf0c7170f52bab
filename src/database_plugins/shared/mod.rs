// ABOUTME: Shared database logic for PostgreSQL and SQLite implementations
// ABOUTME: Row mapping, transaction guard and in-process vector ranking
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Model ↔ SQL row conversion helpers (column access, id/timestamp parsing)
pub mod mappers;

/// Cosine similarity and threshold ranking for backends without a vector operator
pub mod similarity;

/// RAII transaction guard
pub mod transactions;
