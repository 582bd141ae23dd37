//! # ToF Core
//!
//! Domain types, traits, and error definitions for the Test-or-Forget
//! context engine. This crate does no I/O. It defines the entity model and
//! the external capability seams that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external capabilities the engine depends on are defined as traits
//! here and implemented elsewhere:
//! - [`Embedder`] turns context text into a fixed-size vector
//! - [`SemanticIndex`] stores vectors with payloads and answers
//!   nearest-neighbor and filtered-scan queries

pub mod context;
pub mod embedding;
pub mod error;
pub mod event;
pub mod index;

// Re-export key types at crate root for ergonomics
pub use context::{
    Context, ContextMetadata, ContextPayload, ContextState, ContextType, Payload, RecoverySource,
    Snapshot, ValidationResult,
};
pub use embedding::Embedder;
pub use error::{EmbeddingError, Error, IndexError, Result};
pub use event::{DomainEvent, EventBus};
pub use index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};
