// ABOUTME: Cosine similarity and threshold ranking of stored message embeddings
// ABOUTME: Used by backends that score vectors in-process rather than in SQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::cmp::Ordering;

use parley_core::models::RankedMessage;

/// Cosine similarity (`1 - cosine_distance`) of two vectors
///
/// Vectors of different length, empty vectors and zero-magnitude vectors score 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Keep hits strictly above `threshold`, best first, at most `limit`
#[must_use]
pub fn rank(mut hits: Vec<RankedMessage>, threshold: f64, limit: usize) -> Vec<RankedMessage> {
    hits.retain(|hit| hit.similarity > threshold);
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
