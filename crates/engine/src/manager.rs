//! The ToF manager: owns every registered context and drives the
//! register → validate → recover lifecycle.
//!
//! Each context lives in its own slot behind an async mutex, so calls on the
//! same id are serialized while calls on distinct ids run independently. An
//! operation works on a copy of the slot and writes it back only after its
//! last await, so a cancelled call leaves the slot as it was.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use futures::future::join_all;
use std::sync::Arc;
use tof_config::RecoveryConfig;
use tof_core::context::{
    Context, ContextPayload, ContextState, ContextType, Payload, Snapshot, ValidationResult,
};
use tof_core::error::{Error, Result};
use tof_core::event::{DomainEvent, EventBus};
use tof_core::index::ScoredPayload;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::recovery::{RecoveryOrchestrator, RecoveryOutcome, degraded_event};
use crate::store::SemanticStore;
use crate::validator::ValidatorTable;

/// Everything recorded for one context id.
#[derive(Debug, Clone)]
struct ContextSlot {
    context: Context,
    state: ContextState,
    results: Vec<ValidationResult>,
}

impl ContextSlot {
    fn transition(&mut self, next: ContextState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                context_id: self.context.context_id.clone(),
                from: self.state,
                to: next,
            });
        }
        debug!(context_id = %self.context.context_id, from = %self.state, to = %next, "State transition");
        self.state = next;
        Ok(())
    }
}

/// A registered context's slot plus the fields that never change after
/// registration, readable without taking the slot lock.
#[derive(Clone)]
struct SlotEntry {
    parent_id: Option<String>,
    slot: Arc<Mutex<ContextSlot>>,
}

/// Snapshots and validation results of one context, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextHistory {
    pub snapshots: Vec<Snapshot>,
    pub results: Vec<ValidationResult>,
}

pub struct ToFManager {
    contexts: DashMap<String, SlotEntry>,
    validators: ValidatorTable,
    store: Arc<SemanticStore>,
    recovery: RecoveryOrchestrator,
    events: Option<Arc<EventBus>>,
}

impl ToFManager {
    /// Create a manager with the default validators and recovery settings.
    pub fn new(store: SemanticStore) -> Self {
        let store = Arc::new(store);
        Self {
            contexts: DashMap::new(),
            validators: ValidatorTable::default(),
            recovery: RecoveryOrchestrator::new(store.clone()),
            store,
            events: None,
        }
    }

    pub fn with_validators(mut self, validators: ValidatorTable) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_recovery_config(mut self, config: &RecoveryConfig) -> Self {
        let mut recovery = RecoveryOrchestrator::from_config(self.store.clone(), config);
        if let Some(bus) = &self.events {
            recovery = recovery.with_event_bus(bus.clone());
        }
        self.recovery = recovery;
        self
    }

    /// Publish lifecycle events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.recovery = self.recovery.with_event_bus(bus.clone());
        self.events = Some(bus);
        self
    }

    pub fn store(&self) -> &SemanticStore {
        &self.store
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    fn slot(&self, context_id: &str) -> Result<Arc<Mutex<ContextSlot>>> {
        self.contexts
            .get(context_id)
            .map(|entry| entry.value().slot.clone())
            .ok_or_else(|| Error::NotFound(context_id.to_string()))
    }

    /// Create or replace a context. Replacing resets its history and results.
    pub fn register_context(
        &self,
        context_id: impl Into<String>,
        data: Payload,
        context_type: ContextType,
        tags: impl IntoIterator<Item = String>,
        parent_id: Option<String>,
    ) -> Context {
        let context = Context::new(context_id, data, context_type, tags, parent_id);
        let slot = ContextSlot {
            context: context.clone(),
            state: ContextState::Registered,
            results: Vec::new(),
        };
        let entry = SlotEntry {
            parent_id: context.metadata.parent_id.clone(),
            slot: Arc::new(Mutex::new(slot)),
        };
        let replaced = self
            .contexts
            .insert(context.context_id.clone(), entry)
            .is_some();

        info!(
            context_id = %context.context_id,
            context_type = %context_type,
            replaced,
            "Registered context"
        );
        self.publish(DomainEvent::ContextRegistered {
            context_id: context.context_id.clone(),
            context_type,
            timestamp: Utc::now(),
        });
        context
    }

    /// Checkpoint the context, then run its type's validator.
    ///
    /// A pass is persisted to the semantic index; if that write fails the
    /// result is still a pass.
    ///
    /// The write happens before the local commit. A call cancelled after the
    /// backend accepted the write leaves the index one version ahead of the
    /// context; the next committed pass overwrites that point.
    pub async fn validate_context(&self, context_id: &str) -> Result<ValidationResult> {
        let slot = self.slot(context_id)?;
        let mut guard = slot.lock().await;
        let mut working = guard.clone();

        working.transition(ContextState::Validating)?;
        let checkpoint = working.context.save_state().version;

        let result = match self.validators.check(&working.context) {
            Ok(message) => {
                working.context.mark_validated(Utc::now());
                if let Err(e) = self.store.persist(&working.context).await {
                    warn!(context_id, error = %e, "Validated context not persisted");
                    self.publish(degraded_event(&e));
                }
                working.transition(ContextState::Valid)?;
                ValidationResult::pass(context_id, checkpoint, message)
            }
            Err(rejection) => {
                working.transition(ContextState::Invalid)?;
                warn!(context_id, version = checkpoint, reason = %rejection.message, "Validation failed");
                ValidationResult::fail(context_id, checkpoint, rejection.message, rejection.missing_fields)
            }
        };

        working.results.push(result.clone());
        *guard = working;
        drop(guard);

        info!(
            context_id,
            passed = result.passed,
            version = checkpoint,
            "Validated context"
        );
        self.publish(DomainEvent::ContextValidated {
            context_id: context_id.to_string(),
            passed: result.passed,
            version: checkpoint,
            timestamp: result.timestamp,
        });
        Ok(result)
    }

    /// Validate several contexts concurrently. Results come back in input
    /// order.
    pub async fn validate_many(&self, context_ids: &[String]) -> Vec<(String, Result<ValidationResult>)> {
        let results = join_all(context_ids.iter().map(|id| self.validate_context(id))).await;
        context_ids.iter().cloned().zip(results).collect()
    }

    /// Repair a context from the semantic index or its local history.
    ///
    /// Works from any settled state. The context returns to `Registered`
    /// when it was `Invalid` or its payload changed.
    pub async fn recover_context(&self, context_id: &str) -> Result<RecoveryOutcome> {
        let slot = self.slot(context_id)?;
        let mut guard = slot.lock().await;
        let mut working = guard.clone();

        let previous = working.state;
        working.transition(ContextState::Recovering)?;

        let outcome = self.recovery.recover(working.context.clone()).await;
        let changed = outcome.context.data != working.context.data;
        let next = if previous == ContextState::Invalid || changed {
            ContextState::Registered
        } else {
            previous
        };
        working.transition(next)?;
        working.context = outcome.context.clone();
        *guard = working;
        drop(guard);

        info!(context_id, source = %outcome.source, changed, "Recovery finished");
        self.publish(DomainEvent::ContextRecovered {
            context_id: context_id.to_string(),
            source: outcome.source,
            timestamp: Utc::now(),
        });
        Ok(outcome)
    }

    pub async fn get_context_history(&self, context_id: &str) -> Result<ContextHistory> {
        let slot = self.slot(context_id)?;
        let guard = slot.lock().await;
        Ok(ContextHistory {
            snapshots: guard.context.history().to_vec(),
            results: guard.results.clone(),
        })
    }

    pub async fn get_context(&self, context_id: &str) -> Result<Context> {
        let slot = self.slot(context_id)?;
        let guard = slot.lock().await;
        Ok(guard.context.clone())
    }

    pub async fn context_state(&self, context_id: &str) -> Result<ContextState> {
        let slot = self.slot(context_id)?;
        let guard = slot.lock().await;
        Ok(guard.state)
    }

    /// Replace the payload between validations.
    ///
    /// Not a lifecycle step: no snapshot, no version change, state untouched.
    pub async fn update_context_data(&self, context_id: &str, data: Payload) -> Result<Context> {
        let slot = self.slot(context_id)?;
        let mut guard = slot.lock().await;
        guard.context.data = data;
        debug!(context_id, version = guard.context.version(), "Context data updated");
        Ok(guard.context.clone())
    }

    /// Read one historical payload without changing the context.
    pub async fn restore_snapshot(&self, context_id: &str, index: usize) -> Result<Option<Payload>> {
        let slot = self.slot(context_id)?;
        let guard = slot.lock().await;
        Ok(guard.context.restore(index).cloned())
    }

    /// Ids of the contexts registered with `parent_id` as their parent,
    /// sorted. Never waits on a context's lock.
    pub fn children_of(&self, parent_id: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .contexts
            .iter()
            .filter(|e| e.value().parent_id.as_deref() == Some(parent_id))
            .map(|e| e.key().clone())
            .collect();
        children.sort();
        children
    }

    /// Stored contexts similar to the given one's current payload, excluding
    /// the context itself.
    pub async fn find_similar(
        &self,
        context_id: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPayload>> {
        let context = self.get_context(context_id).await?;
        // One extra slot for the context's own stored copy.
        let mut hits = self
            .store
            .neighbors(&context, score_threshold, limit.saturating_add(1))
            .await?;
        hits.retain(|h| h.payload.context_id != context_id);
        hits.truncate(limit);
        Ok(hits)
    }

    pub async fn find_by_type(&self, context_type: ContextType, limit: usize) -> Result<Vec<ContextPayload>> {
        self.store.find_by_type(context_type, limit).await
    }

    pub async fn find_by_tags(&self, tags: &[String], limit: usize) -> Result<Vec<ContextPayload>> {
        self.store.find_by_tags(tags, limit).await
    }

    /// Registered ids, sorted.
    pub fn context_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tof_core::context::RecoverySource;

    fn data(v: Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    fn tool_data() -> Payload {
        data(json!({"tool_name": "grep", "tool_state": "idle", "last_execution": "2024-05-01"}))
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let manager = ToFManager::local();
        assert!(matches!(manager.validate_context("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.recover_context("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.get_context_history("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(
            manager.update_context_data("nope", Payload::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn state_follows_lifecycle() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Registered);

        manager.validate_context("tool-1").await.unwrap();
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Valid);

        manager.update_context_data("tool-1", Payload::new()).await.unwrap();
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Valid);

        manager.validate_context("tool-1").await.unwrap();
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Invalid);

        manager.recover_context("tool-1").await.unwrap();
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Registered);
    }

    #[tokio::test]
    async fn recover_without_change_keeps_valid_state() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();

        let outcome = manager.recover_context("tool-1").await.unwrap();
        assert_eq!(outcome.context.data, tool_data());
        assert_eq!(manager.context_state("tool-1").await.unwrap(), ContextState::Valid);
    }

    #[tokio::test]
    async fn update_does_not_snapshot() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        let updated = manager
            .update_context_data("tool-1", data(json!({"tool_name": "sed"})))
            .await
            .unwrap();
        assert_eq!(updated.version(), 1);
        assert!(manager.get_context_history("tool-1").await.unwrap().snapshots.is_empty());
    }

    #[tokio::test]
    async fn reregister_resets_history_and_results() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();

        let fresh = manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        assert_eq!(fresh.version(), 1);
        let history = manager.get_context_history("tool-1").await.unwrap();
        assert!(history.snapshots.is_empty());
        assert!(history.results.is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn results_are_logged_in_order() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", data(json!({"tool_name": "x"})), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();
        manager.update_context_data("tool-1", tool_data()).await.unwrap();
        manager.validate_context("tool-1").await.unwrap();

        let history = manager.get_context_history("tool-1").await.unwrap();
        let outcomes: Vec<_> = history.results.iter().map(|r| (r.passed, r.version)).collect();
        assert_eq!(outcomes, vec![(false, 1), (true, 2)]);
        assert_eq!(history.snapshots[0].data["tool_name"], "x");
    }

    #[tokio::test]
    async fn restore_snapshot_is_a_read() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();

        assert_eq!(manager.restore_snapshot("tool-1", 0).await.unwrap(), Some(tool_data()));
        assert_eq!(manager.restore_snapshot("tool-1", 5).await.unwrap(), None);
        assert_eq!(manager.get_context("tool-1").await.unwrap().history().len(), 1);
    }

    #[tokio::test]
    async fn find_similar_accepts_unbounded_limit() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        manager.register_context("tool-2", tool_data(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();
        manager.validate_context("tool-2").await.unwrap();

        let hits = manager.find_similar("tool-1", usize::MAX, 0.0).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.payload.context_id.as_str()).collect();
        assert_eq!(ids, vec!["tool-2"]);
    }

    #[tokio::test]
    async fn children_by_parent() {
        let manager = ToFManager::local();
        manager.register_context("root", tool_data(), ContextType::Tool, vec![], None);
        manager.register_context("b", tool_data(), ContextType::Tool, vec![], Some("root".into()));
        manager.register_context("a", tool_data(), ContextType::Tool, vec![], Some("root".into()));
        manager.register_context("c", tool_data(), ContextType::Tool, vec![], Some("other".into()));

        assert_eq!(manager.children_of("root"), vec!["a", "b"]);
        assert_eq!(manager.context_ids(), vec!["a", "b", "c", "root"]);
    }

    #[tokio::test]
    async fn queries_only_see_validated_contexts() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec!["ci".to_string()], None);
        assert!(manager.find_by_type(ContextType::Tool, 10).await.unwrap().is_empty());

        manager.validate_context("tool-1").await.unwrap();
        assert_eq!(manager.find_by_type(ContextType::Tool, 10).await.unwrap().len(), 1);
        assert_eq!(manager.find_by_tags(&["ci".to_string()], 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_similar_excludes_self() {
        let manager = ToFManager::local();
        manager.register_context("tool-1", tool_data(), ContextType::Tool, vec![], None);
        manager.register_context("tool-2", tool_data(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();
        manager.validate_context("tool-2").await.unwrap();

        let hits = manager.find_similar("tool-1", 5, 0.8).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.context_id, "tool-2");
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let manager = ToFManager::local().with_event_bus(bus);

        manager.register_context("tool-1", Payload::new(), ContextType::Tool, vec![], None);
        manager.validate_context("tool-1").await.unwrap();
        manager.recover_context("tool-1").await.unwrap();

        assert!(matches!(*rx.recv().await.unwrap(), DomainEvent::ContextRegistered { .. }));
        assert!(matches!(
            *rx.recv().await.unwrap(),
            DomainEvent::ContextValidated { passed: false, version: 1, .. }
        ));
        match &*rx.recv().await.unwrap() {
            DomainEvent::ContextRecovered { source, .. } => {
                assert_eq!(*source, RecoverySource::LocalHistory)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn slot_rejects_illegal_transition() {
        let mut slot = ContextSlot {
            context: Context::new("x", Payload::new(), ContextType::Test, Vec::<String>::new(), None),
            state: ContextState::Registered,
            results: Vec::new(),
        };
        let err = slot.transition(ContextState::Valid).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ContextState::Registered,
                to: ContextState::Valid,
                ..
            }
        ));
        assert_eq!(slot.state, ContextState::Registered);
    }
}
