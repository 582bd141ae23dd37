//! Embedding providers for the ToF engine.
//!
//! All providers implement the `tof_core::Embedder` trait.
//! The router selects the correct profile for a context type.

pub mod hashing;
pub mod openai_compat;
pub mod router;
pub mod text;

pub use hashing::HashingEmbedder;
pub use openai_compat::OpenAiCompatEmbedder;
pub use router::{EmbeddingProfile, EmbeddingRouter, build_from_config};
pub use text::render_context_text;
