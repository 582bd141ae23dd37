//! The Test-or-Forget context engine.
//!
//! A [`ToFManager`] owns registered contexts and drives their lifecycle:
//!
//! 1. **Register** a typed payload (version 1, empty history)
//! 2. **Validate**: checkpoint, run the type's required-field check, persist
//!    passing contexts to the semantic index
//! 3. **Recover**: restore a corrupted payload from a stored copy, or from
//!    the latest local snapshot
//!
//! The embedder and index are optional collaborators: when they fail the
//! engine keeps working on local state.

pub mod manager;
pub mod recovery;
pub mod retry;
pub mod setup;
pub mod store;
pub mod validator;

pub use manager::{ContextHistory, ToFManager};
pub use recovery::{RecoveryOrchestrator, RecoveryOutcome};
pub use retry::{RetryPolicy, Retryable};
pub use setup::build_index;
pub use store::SemanticStore;
pub use validator::{NonEmpty, Rejection, RequiredFields, Validator, ValidatorTable};
