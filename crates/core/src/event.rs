//! Domain event system — decoupled observation of what a turn did.
//!
//! Events are published when something interesting happens in the system.
//! Subscribers (metrics, logs, tests) react without the loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model produced a final answer
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        tool_rounds: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model asked for a tool that is not registered
    UnknownToolRequested {
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// An outbound notification could not be delivered
    NotificationFailed {
        notifier: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable snake_case name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ResponseGenerated { .. } => "response_generated",
            DomainEvent::ToolExecuted { .. } => "tool_executed",
            DomainEvent::UnknownToolRequested { .. } => "unknown_tool_requested",
            DomainEvent::NotificationFailed { .. } => "notification_failed",
        }
    }
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
