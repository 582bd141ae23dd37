//! Embedding plus index access for the engine.
//!
//! `SemanticStore` pairs the embedding router with the semantic index so a
//! context is always encoded by its type's profile and searched only against
//! vectors from that same profile. Every external call goes through the
//! retry policy.

use std::sync::Arc;
use tof_core::context::{Context, ContextPayload, ContextType};
use tof_core::error::Result;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};
use tof_embeddings::{EmbeddingRouter, render_context_text};
use tracing::debug;

use crate::retry::RetryPolicy;

pub struct SemanticStore {
    router: EmbeddingRouter,
    index: Arc<dyn SemanticIndex>,
    retry: RetryPolicy,
}

impl SemanticStore {
    pub fn new(router: EmbeddingRouter, index: Arc<dyn SemanticIndex>) -> Self {
        Self {
            router,
            index,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn router(&self) -> &EmbeddingRouter {
        &self.router
    }

    pub fn index(&self) -> &Arc<dyn SemanticIndex> {
        &self.index
    }

    /// Encode a context with its type's profile. Returns the profile
    /// identity together with the vector.
    async fn encode(&self, context: &Context) -> Result<(String, Vec<f32>)> {
        let embedder = self.router.embedder_for(context.context_type());
        let text = render_context_text(context);
        let vector = self
            .retry
            .run("encode", || embedder.encode_checked(&text))
            .await?;
        Ok((embedder.model_id().to_string(), vector))
    }

    /// Write the context's current state to the index.
    pub async fn persist(&self, context: &Context) -> Result<()> {
        let (model, vector) = self.encode(context).await?;
        let point = IndexPoint {
            id: context.context_id.clone(),
            payload: context.to_payload(&model),
            model,
            vector,
        };
        self.retry
            .run("upsert", || self.index.upsert(point.clone()))
            .await?;
        debug!(context_id = %context.context_id, version = context.version(), "Context persisted");
        Ok(())
    }

    /// Stored payloads whose vectors are near the context's current payload.
    pub async fn neighbors(
        &self,
        context: &Context,
        score_threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredPayload>> {
        let (model, vector) = self.encode(context).await?;
        let query = SearchQuery {
            model,
            vector,
            limit,
            score_threshold,
            filter: None,
        };
        Ok(self.retry.run("search", || self.index.search(&query)).await?)
    }

    /// The stored payload of this context under its current type and
    /// embedding profile, if any.
    pub async fn stored_copy(&self, context: &Context) -> Result<Option<ContextPayload>> {
        let model = self.router.embedder_for(context.context_type()).model_id().to_string();
        let filter = IndexFilter::All(vec![
            IndexFilter::ContextId(context.context_id.clone()),
            IndexFilter::ContextType(context.context_type()),
            IndexFilter::Model(model),
        ]);
        let found = self.retry.run("scroll", || self.index.scroll(&filter, 1)).await?;
        Ok(found.into_iter().next())
    }

    pub async fn find_by_type(&self, context_type: ContextType, limit: usize) -> Result<Vec<ContextPayload>> {
        let filter = IndexFilter::ContextType(context_type);
        Ok(self.retry.run("scroll", || self.index.scroll(&filter, limit)).await?)
    }

    pub async fn find_by_tags(&self, tags: &[String], limit: usize) -> Result<Vec<ContextPayload>> {
        let filter = IndexFilter::AnyTag(tags.to_vec());
        Ok(self.retry.run("scroll", || self.index.scroll(&filter, limit)).await?)
    }

    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.retry.run("health", || self.index.health_check()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tof_config::EmbeddingConfig;
    use tof_index::InMemoryIndex;

    fn store() -> SemanticStore {
        let router = tof_embeddings::build_from_config(&EmbeddingConfig::default()).unwrap();
        SemanticStore::new(router, Arc::new(InMemoryIndex::new()))
    }

    fn ctx(id: &str, context_type: ContextType, data: serde_json::Value) -> Context {
        Context::new(
            id,
            data.as_object().cloned().unwrap(),
            context_type,
            vec!["ci".to_string()],
            None,
        )
    }

    #[tokio::test]
    async fn persist_tags_payload_with_profile() {
        let store = store();
        let c = ctx("t1", ContextType::Test, json!({"test_name": "a"}));
        store.persist(&c).await.unwrap();

        let stored = store.stored_copy(&c).await.unwrap().unwrap();
        assert_eq!(stored.embedding_model, "test-context");
        assert_eq!(stored.data["test_name"], "a");
    }

    #[tokio::test]
    async fn neighbors_stay_within_profile() {
        let store = store();
        let data = json!({"note": "same words"});
        store.persist(&ctx("t1", ContextType::Test, data.clone())).await.unwrap();
        store.persist(&ctx("s1", ContextType::System, data.clone())).await.unwrap();

        let hits = store
            .neighbors(&ctx("query", ContextType::Test, data), 0.0, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.context_id, "t1");
    }

    #[tokio::test]
    async fn scroll_queries() {
        let store = store();
        store
            .persist(&ctx("e1", ContextType::Emotion, json!({"emotion_type": "joy"})))
            .await
            .unwrap();

        assert_eq!(store.find_by_type(ContextType::Emotion, 10).await.unwrap().len(), 1);
        assert!(store.find_by_type(ContextType::Tool, 10).await.unwrap().is_empty());
        assert_eq!(store.find_by_tags(&["ci".to_string()], 10).await.unwrap().len(), 1);
        let missing = ctx("missing", ContextType::Emotion, json!({}));
        assert!(store.stored_copy(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stored_copy_ignores_other_types() {
        let store = store();
        store
            .persist(&ctx("x", ContextType::Tool, json!({"tool_name": "grep"})))
            .await
            .unwrap();
        store
            .persist(&ctx("y", ContextType::Memory, json!({"content": "old"})))
            .await
            .unwrap();

        let as_test = ctx("x", ContextType::Test, json!({"note": "fresh"}));
        assert!(store.stored_copy(&as_test).await.unwrap().is_none());

        // Same embedding profile, different type.
        let as_tool = ctx("y", ContextType::Tool, json!({}));
        assert!(store.stored_copy(&as_tool).await.unwrap().is_none());

        let as_memory = ctx("y", ContextType::Memory, json!({}));
        let found = store.stored_copy(&as_memory).await.unwrap().unwrap();
        assert_eq!(found.data["content"], "old");
    }
}
