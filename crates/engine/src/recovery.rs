//! Recovery orchestration.
//!
//! Sources are tried in priority order:
//! 1. a differing copy of the same context among its nearest neighbors
//! 2. a differing copy found by exact id lookup, when enabled
//! 3. the most recent local snapshot
//!
//! When none applies the context comes back unchanged. An unreachable
//! embedder or index skips straight to local history.

use chrono::Utc;
use std::sync::Arc;
use tof_config::RecoveryConfig;
use tof_core::context::{Context, ContextPayload, RecoverySource};
use tof_core::error::{Error, Result};
use tof_core::event::{DomainEvent, EventBus};
use tracing::{debug, info, warn};

use crate::store::SemanticStore;

/// A recovered context and where its payload came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    pub context: Context,
    pub source: RecoverySource,
}

pub struct RecoveryOrchestrator {
    store: Arc<SemanticStore>,
    score_threshold: f32,
    candidate_limit: usize,
    keyed_lookup: bool,
    events: Option<Arc<EventBus>>,
}

impl RecoveryOrchestrator {
    pub fn new(store: Arc<SemanticStore>) -> Self {
        Self::from_config(store, &RecoveryConfig::default())
    }

    pub fn from_config(store: Arc<SemanticStore>, config: &RecoveryConfig) -> Self {
        Self {
            store,
            score_threshold: config.score_threshold,
            candidate_limit: config.candidate_limit,
            keyed_lookup: config.keyed_lookup,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Repair a context. Never snapshots, never bumps the version.
    pub async fn recover(&self, mut context: Context) -> RecoveryOutcome {
        match self.external_candidate(&context).await {
            Ok(Some(found)) => {
                info!(
                    context_id = %context.context_id,
                    stored_version = found.version,
                    "Recovered from semantic index"
                );
                context.data = found.data;
                self.persist_best_effort(&context).await;
                return RecoveryOutcome {
                    context,
                    source: RecoverySource::External,
                };
            }
            Ok(None) => {
                debug!(context_id = %context.context_id, "No external copy to recover from");
            }
            Err(e) => {
                warn!(
                    context_id = %context.context_id,
                    error = %e,
                    "External recovery unavailable, falling back to local history"
                );
                self.report_degraded(&e);
            }
        }

        let Some((snapshot_version, data)) = context
            .latest_snapshot()
            .map(|s| (s.version, s.data.clone()))
        else {
            warn!(context_id = %context.context_id, "No recovery possible");
            return RecoveryOutcome {
                context,
                source: RecoverySource::Unrecovered,
            };
        };

        context.data = data;
        info!(
            context_id = %context.context_id,
            snapshot_version,
            "Recovered from local history"
        );
        self.persist_best_effort(&context).await;
        RecoveryOutcome {
            context,
            source: RecoverySource::LocalHistory,
        }
    }

    /// A stored copy of this context, under the same type and embedding
    /// profile, whose payload differs from the current one.
    async fn external_candidate(&self, context: &Context) -> Result<Option<ContextPayload>> {
        let neighbors = self
            .store
            .neighbors(context, self.score_threshold, self.candidate_limit)
            .await?;

        let mut own = neighbors
            .into_iter()
            .filter(|n| {
                n.payload.context_id == context.context_id
                    && n.payload.context_type == context.context_type()
            })
            .peekable();
        if own.peek().is_some() {
            return Ok(own.map(|n| n.payload).find(|p| p.data != context.data));
        }

        if !self.keyed_lookup {
            return Ok(None);
        }
        Ok(self
            .store
            .stored_copy(context)
            .await?
            .filter(|p| p.data != context.data))
    }

    async fn persist_best_effort(&self, context: &Context) {
        if let Err(e) = self.store.persist(context).await {
            warn!(context_id = %context.context_id, error = %e, "Failed to persist recovered context");
            self.report_degraded(&e);
        }
    }

    fn report_degraded(&self, error: &Error) {
        if let Some(bus) = &self.events {
            bus.publish(degraded_event(error));
        }
    }
}

/// Build the event published when an external capability fails.
pub(crate) fn degraded_event(error: &Error) -> DomainEvent {
    let (service, error_message) = match error {
        Error::ExternalServiceUnavailable { service, reason, .. } => {
            (service.clone(), reason.clone())
        }
        other => ("unknown".to_string(), other.to_string()),
    };
    DomainEvent::ExternalServiceDegraded {
        service,
        error_message,
        timestamp: Utc::now(),
    }
}
