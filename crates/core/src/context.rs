//! Context entity model: the typed, versioned unit of tracked state.
//!
//! A [`Context`] owns its payload, its metadata, and an append-only history
//! of [`Snapshot`]s. The history can only grow through [`Context::save_state`];
//! nothing in this module removes or rewrites a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A context payload: string keys to arbitrary JSON values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The kind of state a context tracks. Selects the validator and the
/// embedding profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    Test,
    Tool,
    Memory,
    Intention,
    Emotion,
    Learning,
    System,
    Participant,
    Feeling,
    Conversation,
}

impl ContextType {
    /// Every context type, in declaration order.
    pub const ALL: [ContextType; 10] = [
        ContextType::Test,
        ContextType::Tool,
        ContextType::Memory,
        ContextType::Intention,
        ContextType::Emotion,
        ContextType::Learning,
        ContextType::System,
        ContextType::Participant,
        ContextType::Feeling,
        ContextType::Conversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Test => "TEST",
            ContextType::Tool => "TOOL",
            ContextType::Memory => "MEMORY",
            ContextType::Intention => "INTENTION",
            ContextType::Emotion => "EMOTION",
            ContextType::Learning => "LEARNING",
            ContextType::System => "SYSTEM",
            ContextType::Participant => "PARTICIPANT",
            ContextType::Feeling => "FEELING",
            ContextType::Conversation => "CONVERSATION",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        ContextType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown context type: {s}"))
    }
}

/// Lifecycle state of a context inside a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Registered,
    Validating,
    Valid,
    Invalid,
    Recovering,
}

impl ContextState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// `Valid` and `Invalid` may re-enter `Validating` once the caller has
    /// changed the payload. `Recovering` is normally entered from `Invalid`;
    /// the manager also allows best-effort recovery from the other settled
    /// states.
    pub fn can_transition_to(self, next: ContextState) -> bool {
        use ContextState::*;
        matches!(
            (self, next),
            (Registered, Validating)
                | (Valid, Validating)
                | (Invalid, Validating)
                | (Validating, Valid)
                | (Validating, Invalid)
                | (Invalid, Recovering)
                | (Registered, Recovering)
                | (Valid, Recovering)
                | (Recovering, Registered)
                | (Recovering, Valid)
        )
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextState::Registered => "registered",
            ContextState::Validating => "validating",
            ContextState::Valid => "valid",
            ContextState::Invalid => "invalid",
            ContextState::Recovering => "recovering",
        };
        f.write_str(s)
    }
}

/// Metadata for a context instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub context_type: ContextType,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,

    /// Number of passing validations.
    #[serde(default)]
    pub validation_count: u64,

    /// Starts at 1; bumped by every snapshot.
    pub version: u64,

    /// Lineage back-reference. Lookup only, no cascading behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// An immutable copy of a context payload captured before a validation
/// attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub data: Payload,
    pub captured_at: DateTime<Utc>,
}

/// A context instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub context_id: String,
    pub data: Payload,
    pub metadata: ContextMetadata,
    #[serde(default)]
    history: Vec<Snapshot>,
}

impl Context {
    /// Create a fresh context at version 1 with an empty history.
    pub fn new(
        context_id: impl Into<String>,
        data: Payload,
        context_type: ContextType,
        tags: impl IntoIterator<Item = String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            context_id: context_id.into(),
            data,
            metadata: ContextMetadata {
                context_type,
                tags: tags.into_iter().collect(),
                created_at: Utc::now(),
                last_validated: None,
                validation_count: 0,
                version: 1,
                parent_id,
            },
            history: Vec::new(),
        }
    }

    pub fn context_type(&self) -> ContextType {
        self.metadata.context_type
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    /// Checkpoint the current payload, then bump the version.
    pub fn save_state(&mut self) -> &Snapshot {
        self.history.push(Snapshot {
            version: self.metadata.version,
            data: self.data.clone(),
            captured_at: Utc::now(),
        });
        self.metadata.version += 1;
        // The push above guarantees a last element.
        &self.history[self.history.len() - 1]
    }

    /// Read a historical payload without touching the history.
    pub fn restore(&self, index: usize) -> Option<&Payload> {
        self.history.get(index).map(|s| &s.data)
    }

    /// All snapshots, oldest first.
    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.history.last()
    }

    /// Record a passing validation.
    pub fn mark_validated(&mut self, at: DateTime<Utc>) {
        self.metadata.validation_count += 1;
        self.metadata.last_validated = Some(at);
    }

    /// Required keys absent from the payload, sorted.
    pub fn missing_fields(&self, required: &[&str]) -> Vec<String> {
        let mut missing: Vec<String> = required
            .iter()
            .filter(|field| !self.data.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        missing.sort();
        missing
    }

    /// Build the document persisted to the semantic index, tagged with the
    /// identity of the embedding model that produced its vector.
    pub fn to_payload(&self, embedding_model: &str) -> ContextPayload {
        ContextPayload {
            context_id: self.context_id.clone(),
            context_type: self.metadata.context_type,
            tags: self.metadata.tags.iter().cloned().collect(),
            data: self.data.clone(),
            version: self.metadata.version,
            created_at: self.metadata.created_at,
            last_validated: self.metadata.last_validated,
            validation_count: self.metadata.validation_count,
            parent_id: self.metadata.parent_id.clone(),
            embedding_model: embedding_model.to_string(),
        }
    }
}

/// The externally persisted form of a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub context_id: String,
    pub context_type: ContextType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data: Payload,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validation_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub embedding_model: String,
}

/// Where a recovery took its payload from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySource {
    /// A differing copy of the same context found in the semantic index.
    External,
    /// The most recent local snapshot.
    LocalHistory,
    /// Nothing to recover from; the context was returned unchanged.
    Unrecovered,
}

impl fmt::Display for RecoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoverySource::External => "external",
            RecoverySource::LocalHistory => "local_history",
            RecoverySource::Unrecovered => "unrecovered",
        };
        f.write_str(s)
    }
}

/// Result of a context validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub message: String,
    pub context_id: String,

    /// The version checkpointed by this attempt.
    pub version: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl ValidationResult {
    pub fn pass(context_id: impl Into<String>, version: u64, message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            context_id: context_id.into(),
            version,
            missing_fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn fail(
        context_id: impl Into<String>,
        version: u64,
        message: impl Into<String>,
        missing_fields: Vec<String>,
    ) -> Self {
        Self {
            passed: false,
            message: message.into(),
            context_id: context_id.into(),
            version,
            missing_fields,
            timestamp: Utc::now(),
        }
    }
}
