//! Embedder trait, the abstraction over text-embedding backends.
//!
//! An embedder turns context text into a fixed-size vector. Vectors are only
//! comparable within one embedding space, so every embedder exposes a model
//! identity that is stored alongside each vector it produces.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// The core Embedder trait.
///
/// Implementations: local feature hashing, OpenAI-compatible HTTP endpoints.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identity of the embedding space (e.g. "general-context").
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Encode a piece of text.
    async fn encode(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;

    /// Encode and check the vector length against [`Embedder::dimensions`].
    async fn encode_checked(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let vector = self.encode(text).await?;
        if vector.len() != self.dimensions() {
            return Err(EmbeddingError::DimensionMismatch {
                model: self.model_id().to_string(),
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder {
        dims: usize,
        output: Vec<f32>,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_id(&self) -> &str {
            "fixed"
        }
        fn dimensions(&self) -> usize {
            self.dims
        }
        async fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn encode_checked_accepts_matching_length() {
        let e = FixedEmbedder { dims: 3, output: vec![1.0, 0.0, 0.0] };
        assert_eq!(e.encode_checked("x").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn encode_checked_rejects_wrong_length() {
        let e = FixedEmbedder { dims: 4, output: vec![1.0, 0.0] };
        let err = e.encode_checked("x").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 4, actual: 2, .. }
        ));
    }
}
