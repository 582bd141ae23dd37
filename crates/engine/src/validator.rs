//! Type-dispatched validation.
//!
//! Each context type maps to a [`Validator`] in a [`ValidatorTable`]. Types
//! without an entry fall through to [`NonEmpty`].

use std::collections::HashMap;
use std::sync::Arc;
use tof_core::context::{Context, ContextType};

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub message: String,
    pub missing_fields: Vec<String>,
}

/// A pure predicate over a context's payload.
pub trait Validator: Send + Sync {
    /// Message recorded on a passing validation.
    fn describe_pass(&self, context: &Context) -> String;

    fn check(&self, context: &Context) -> Result<(), Rejection>;
}

/// Passes when every listed key is present in the payload.
pub struct RequiredFields {
    fields: Vec<&'static str>,
}

impl RequiredFields {
    pub fn new(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

impl Validator for RequiredFields {
    fn describe_pass(&self, context: &Context) -> String {
        format!("{} context validated successfully", context.context_type())
    }

    fn check(&self, context: &Context) -> Result<(), Rejection> {
        let missing = context.missing_fields(&self.fields);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Rejection {
                message: format!("Missing required fields: {}", missing.join(", ")),
                missing_fields: missing,
            })
        }
    }
}

/// Passes when the payload has at least one key.
pub struct NonEmpty;

impl Validator for NonEmpty {
    fn describe_pass(&self, context: &Context) -> String {
        format!("Generic validation passed for type: {}", context.context_type())
    }

    fn check(&self, context: &Context) -> Result<(), Rejection> {
        if context.data.is_empty() {
            Err(Rejection {
                message: format!("Empty payload for type: {}", context.context_type()),
                missing_fields: Vec::new(),
            })
        } else {
            Ok(())
        }
    }
}

/// Strategy table keyed by context type.
pub struct ValidatorTable {
    validators: HashMap<ContextType, Arc<dyn Validator>>,
    generic: Arc<dyn Validator>,
}

impl ValidatorTable {
    /// An empty table: every type uses the generic non-empty check.
    pub fn generic_only() -> Self {
        Self {
            validators: HashMap::new(),
            generic: Arc::new(NonEmpty),
        }
    }

    /// Replace the validator for one type.
    pub fn register(&mut self, context_type: ContextType, validator: Arc<dyn Validator>) {
        self.validators.insert(context_type, validator);
    }

    pub fn get(&self, context_type: ContextType) -> &Arc<dyn Validator> {
        self.validators.get(&context_type).unwrap_or(&self.generic)
    }

    /// Run the validator for the context's type.
    pub fn check(&self, context: &Context) -> Result<String, Rejection> {
        let validator = self.get(context.context_type());
        validator.check(context)?;
        Ok(validator.describe_pass(context))
    }
}

impl Default for ValidatorTable {
    fn default() -> Self {
        let mut table = Self::generic_only();
        let required: [(ContextType, &[&'static str]); 6] = [
            (ContextType::Test, &["test_name", "test_result", "timestamp"]),
            (ContextType::Tool, &["tool_name", "tool_state", "last_execution"]),
            (ContextType::Memory, &["memory_type", "content", "timestamp", "importance"]),
            (ContextType::Intention, &["actor", "intention", "confidence", "timestamp"]),
            (ContextType::Emotion, &["emotion_type", "intensity", "trigger", "timestamp"]),
            (ContextType::Learning, &["topic", "progress", "mastery_level", "last_update"]),
        ];
        for (context_type, fields) in required {
            table.register(context_type, Arc::new(RequiredFields::new(fields)));
        }
        table
    }
}
