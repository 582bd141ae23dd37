//! Semantic index trait: keyed vector storage with similarity search.
//!
//! The index is an opaque external capability. The engine only relies on:
//! - `upsert` of one point per (embedding model, context id)
//! - ranked `search` restricted to a single embedding model
//! - filtered `scroll` over stored payloads

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{ContextPayload, ContextType};
use crate::error::IndexError;

/// A vector plus the payload it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPoint {
    /// The context id the point belongs to.
    pub id: String,

    /// Embedding model that produced `vector`.
    pub model: String,

    pub vector: Vec<f32>,

    pub payload: ContextPayload,
}

/// A nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Only vectors produced by this model are compared.
    pub model: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    /// Minimum cosine similarity, inclusive.
    pub score_threshold: f32,
    pub filter: Option<IndexFilter>,
}

/// A payload with its similarity to the query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPayload {
    pub payload: ContextPayload,
    pub score: f32,
}

/// Field predicates supported by `search` and `scroll`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFilter {
    ContextId(String),
    ContextType(ContextType),
    /// Matches payloads carrying at least one of the tags.
    AnyTag(Vec<String>),
    ParentId(String),
    /// Matches payloads stored under this embedding model.
    Model(String),
    /// Matches when every inner filter matches.
    All(Vec<IndexFilter>),
}

impl IndexFilter {
    pub fn matches(&self, payload: &ContextPayload) -> bool {
        match self {
            IndexFilter::ContextId(id) => &payload.context_id == id,
            IndexFilter::ContextType(t) => payload.context_type == *t,
            IndexFilter::AnyTag(tags) => payload.tags.iter().any(|t| tags.contains(t)),
            IndexFilter::ParentId(parent) => payload.parent_id.as_deref() == Some(parent.as_str()),
            IndexFilter::Model(model) => &payload.embedding_model == model,
            IndexFilter::All(filters) => filters.iter().all(|f| f.matches(payload)),
        }
    }
}

/// The core SemanticIndex trait.
///
/// Implementations: in-memory, JSONL file, Qdrant, none (no-op).
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// The backend name (e.g., "memory", "qdrant", "none").
    fn name(&self) -> &str;

    /// Insert or replace the point for `(point.model, point.id)`.
    async fn upsert(&self, point: IndexPoint) -> std::result::Result<(), IndexError>;

    /// Rank stored payloads by similarity to the query vector, best first.
    async fn search(&self, query: &SearchQuery) -> std::result::Result<Vec<ScoredPayload>, IndexError>;

    /// List payloads matching a filter, in no particular order.
    async fn scroll(
        &self,
        filter: &IndexFilter,
        limit: usize,
    ) -> std::result::Result<Vec<ContextPayload>, IndexError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> std::result::Result<bool, IndexError>;
}
