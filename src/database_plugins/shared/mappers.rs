// ABOUTME: Model to SQL row conversion helpers for database operations
// ABOUTME: Column access with error mapping plus text encodings used by the SQLite backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Model ↔ SQL row conversion helpers
//!
//! `PostgreSQL` stores ids, timestamps and vectors natively. `SQLite` stores ids as
//! text, timestamps as fixed-width RFC 3339 strings (nanosecond precision, `Z`
//! suffix) so that lexical order equals chronological order, and embeddings as a
//! JSON array.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::models::MessageRole;
use sqlx::{ColumnIndex, Decode, Row, Type};
use tracing::error;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Read a column, mapping decode failures to a database error naming the column
///
/// # Errors
///
/// Returns an error if the column is missing or has an incompatible type
pub fn get_column<'r, R, T>(row: &'r R, column: &str) -> AppResult<T>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(column)
        .map_err(|e| AppError::database(format!("Failed to get column '{column}': {e}")))
}

/// Map a driver error to a database error carrying `context` as its message
///
/// The driver text is logged and kept as the error source, never as the message.
pub fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| {
        error!(error = %e, "{context}");
        AppError::database(context).with_source(e)
    }
}

/// Encode a timestamp for text storage
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decode a timestamp stored by [`format_timestamp`]
///
/// # Errors
///
/// Returns an error if the text is not RFC 3339
pub fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{value}': {e}")))
}

/// Decode a UUID stored as text
///
/// # Errors
///
/// Returns an error if the text is not a UUID
pub fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::database(format!("Invalid UUID '{value}': {e}")))
}

/// Decode the `message_type` column
///
/// # Errors
///
/// Returns an error if the stored role is unknown
pub fn parse_role(value: &str) -> AppResult<MessageRole> {
    value
        .parse()
        .map_err(|_| AppError::database(format!("Invalid message_type '{value}' in store")))
}

/// Encode an embedding for a JSON text column
///
/// # Errors
///
/// Returns an error if serialization fails
pub fn encode_embedding(embedding: &[f32]) -> AppResult<String> {
    serde_json::to_string(embedding)
        .map_err(|e| AppError::internal(format!("Failed to encode embedding: {e}")))
}

/// Decode an embedding from a JSON text column
///
/// # Errors
///
/// Returns an error if the text is not a JSON number array
pub fn decode_embedding(value: &str) -> AppResult<Vec<f32>> {
    serde_json::from_str(value)
        .map_err(|e| AppError::database(format!("Invalid stored embedding: {e}")))
}
