//! Wiring a manager from configuration.

use std::sync::Arc;
use std::time::Duration;
use tof_config::{EmbeddingConfig, TofConfig};
use tof_core::error::{Error, Result};
use tof_core::index::SemanticIndex;
use tof_embeddings::EmbeddingRouter;
use tof_index::{FileIndex, InMemoryIndex, NoopIndex, QdrantIndex};
use tracing::info;

use crate::manager::ToFManager;
use crate::retry::RetryPolicy;
use crate::store::SemanticStore;

/// Build the semantic index named by `config.index.backend`.
pub fn build_index(config: &TofConfig) -> Result<Arc<dyn SemanticIndex>> {
    let index: Arc<dyn SemanticIndex> = match config.index.backend.as_str() {
        "memory" => Arc::new(InMemoryIndex::new()),
        "file" => Arc::new(FileIndex::new(config.index_path())),
        "none" => Arc::new(NoopIndex),
        "qdrant" => {
            let mut qdrant = QdrantIndex::new(
                &config.index.url,
                &config.index.collection,
                config.index.api_key.clone(),
                Duration::from_secs(config.index.timeout_secs),
            );
            for profile in &config.embedding.profiles {
                qdrant = qdrant.with_vector(&profile.name, profile.dimensions);
            }
            Arc::new(qdrant)
        }
        other => {
            return Err(Error::Config {
                message: format!("unknown index backend '{other}'"),
            });
        }
    };
    info!(backend = index.name(), "Semantic index ready");
    Ok(index)
}

impl ToFManager {
    /// A manager on the local hashing embedder and an in-memory index.
    pub fn local() -> Self {
        let router = local_router(&EmbeddingConfig::default());
        Self::new(SemanticStore::new(router, Arc::new(InMemoryIndex::new())))
    }

    /// A manager wired from configuration.
    pub fn from_config(config: &TofConfig) -> Result<Self> {
        let router = tof_embeddings::build_from_config(&config.embedding)?;
        let index = build_index(config)?;
        let store =
            SemanticStore::new(router, index).with_retry(RetryPolicy::from_config(&config.retry));
        Ok(Self::new(store).with_recovery_config(&config.recovery))
    }
}

fn local_router(config: &EmbeddingConfig) -> EmbeddingRouter {
    // The default profiles always include the fallback.
    tof_embeddings::build_from_config(config).unwrap_or_else(|_| {
        EmbeddingRouter::single(Arc::new(tof_embeddings::HashingEmbedder::new(
            &config.fallback_profile,
            384,
        )))
    })
}
