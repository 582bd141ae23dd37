//! In-memory index for tests and ephemeral sessions.

use async_trait::async_trait;
use std::sync::Arc;
use tof_core::context::ContextPayload;
use tof_core::error::IndexError;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};
use tokio::sync::RwLock;

use crate::vector::{rank_points, scroll_points, upsert_point};

/// An in-memory index that stores points in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone)]
pub struct InMemoryIndex {
    points: Arc<RwLock<Vec<IndexPoint>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            points: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of stored points across all embedding models.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError> {
        upsert_point(&mut *self.points.write().await, point)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredPayload>, IndexError> {
        Ok(rank_points(&self.points.read().await, query))
    }

    async fn scroll(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ContextPayload>, IndexError> {
        Ok(scroll_points(&self.points.read().await, filter, limit))
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tof_core::context::{Context, ContextType};

    fn point(id: &str, data: serde_json::Value, vector: Vec<f32>) -> IndexPoint {
        let ctx = Context::new(
            id,
            data.as_object().cloned().unwrap(),
            ContextType::Test,
            vec!["suite".to_string()],
            None,
        );
        IndexPoint {
            id: id.into(),
            model: "test-context".into(),
            vector,
            payload: ctx.to_payload("test-context"),
        }
    }

    #[tokio::test]
    async fn upsert_and_search() {
        let index = InMemoryIndex::new();
        index.upsert(point("t1", json!({"test_name": "a"}), vec![1.0, 0.0])).await.unwrap();
        index.upsert(point("t2", json!({"test_name": "b"}), vec![0.0, 1.0])).await.unwrap();

        let results = index
            .search(&SearchQuery {
                model: "test-context".into(),
                vector: vec![0.9, 0.1],
                limit: 3,
                score_threshold: 0.8,
                filter: None,
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload.context_id, "t1");
        assert_eq!(results[0].payload.data["test_name"], "a");
    }

    #[tokio::test]
    async fn upsert_overwrites_payload() {
        let index = InMemoryIndex::new();
        index.upsert(point("t1", json!({"v": 1}), vec![1.0, 0.0])).await.unwrap();
        index.upsert(point("t1", json!({"v": 2}), vec![1.0, 0.0])).await.unwrap();
        assert_eq!(index.len().await, 1);

        let found = index
            .scroll(&IndexFilter::ContextId("t1".into()), 1)
            .await
            .unwrap();
        assert_eq!(found[0].data["v"], 2);
    }

    #[tokio::test]
    async fn scroll_by_tag() {
        let index = InMemoryIndex::new();
        index.upsert(point("t1", json!({}), vec![1.0])).await.unwrap();
        let hits = index
            .scroll(&IndexFilter::AnyTag(vec!["suite".into()]), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = index
            .scroll(&IndexFilter::AnyTag(vec!["other".into()]), 10)
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let index = InMemoryIndex::new();
        let handle = index.clone();
        index.upsert(point("t1", json!({}), vec![1.0])).await.unwrap();
        assert!(!handle.is_empty().await);
    }
}
