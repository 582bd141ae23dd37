//! No-op index that disables external persistence entirely.
//!
//! With this backend the engine runs on local predicate checks and local
//! history only.

use async_trait::async_trait;
use tof_core::context::ContextPayload;
use tof_core::error::IndexError;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};

/// An index that stores nothing and finds nothing.
pub struct NoopIndex;

#[async_trait]
impl SemanticIndex for NoopIndex {
    fn name(&self) -> &str {
        "none"
    }

    async fn upsert(&self, _point: IndexPoint) -> Result<(), IndexError> {
        Ok(())
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<ScoredPayload>, IndexError> {
        Ok(Vec::new())
    }

    async fn scroll(&self, _filter: &IndexFilter, _limit: usize) -> Result<Vec<ContextPayload>, IndexError> {
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}
