//! Semantic index implementations for the ToF engine.

pub mod file;
pub mod in_memory;
pub mod noop;
pub mod vector;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use file::FileIndex;
pub use in_memory::InMemoryIndex;
pub use noop::NoopIndex;
pub use vector::{cosine_similarity, rank_points, scroll_points, upsert_point};

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantIndex;
