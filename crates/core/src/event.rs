//! Domain event system. Lets collaborators observe the context lifecycle
//! without coupling to the manager.
//!
//! Events are published when a context is registered, validated, or
//! recovered, and when an external capability degrades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::context::{ContextType, RecoverySource};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A context was registered (or re-registered)
    ContextRegistered {
        context_id: String,
        context_type: ContextType,
        timestamp: DateTime<Utc>,
    },

    /// A validation attempt finished
    ContextValidated {
        context_id: String,
        passed: bool,
        version: u64,
        timestamp: DateTime<Utc>,
    },

    /// A recovery attempt finished
    ContextRecovered {
        context_id: String,
        source: RecoverySource,
        timestamp: DateTime<Utc>,
    },

    /// The embedding or index capability failed and the engine degraded
    /// to local-only behavior
    ExternalServiceDegraded {
        service: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
