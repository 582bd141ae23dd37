//! Vector similarity and point-set utilities shared by the local backends.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Ranked search over a point set, restricted to one embedding model
//! - Keyed upsert that enforces one vector length per model

use tof_core::context::ContextPayload;
use tof_core::error::IndexError;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank points by cosine similarity to the query vector.
///
/// Only points produced by `query.model` with a matching vector length are
/// compared. Results are sorted by descending score, at or above the
/// threshold, truncated to the limit.
pub fn rank_points(points: &[IndexPoint], query: &SearchQuery) -> Vec<ScoredPayload> {
    let mut scored: Vec<ScoredPayload> = points
        .iter()
        .filter(|p| p.model == query.model && p.vector.len() == query.vector.len())
        .filter(|p| query.filter.as_ref().is_none_or(|f| f.matches(&p.payload)))
        .filter_map(|p| {
            let score = cosine_similarity(&p.vector, &query.vector);
            (score >= query.score_threshold).then(|| ScoredPayload {
                payload: p.payload.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(query.limit);
    scored
}

/// Payloads matching a filter, at most `limit`.
pub fn scroll_points(points: &[IndexPoint], filter: &IndexFilter, limit: usize) -> Vec<ContextPayload> {
    points
        .iter()
        .filter(|p| filter.matches(&p.payload))
        .take(limit)
        .map(|p| p.payload.clone())
        .collect()
}

/// Insert or replace the point keyed by `(model, id)`.
///
/// Every vector stored under one model must have the same length.
pub fn upsert_point(points: &mut Vec<IndexPoint>, point: IndexPoint) -> Result<(), IndexError> {
    if let Some(existing) = points
        .iter()
        .find(|p| p.model == point.model && p.vector.len() != point.vector.len())
    {
        return Err(IndexError::DimensionMismatch {
            expected: existing.vector.len(),
            actual: point.vector.len(),
        });
    }

    match points
        .iter_mut()
        .find(|p| p.model == point.model && p.id == point.id)
    {
        Some(slot) => *slot = point,
        None => points.push(point),
    }
    Ok(())
}
