//! Domain events: what happened during startup and conversation turns.
//!
//! Hosts subscribe to surface progress (the CLI prints tool activity in
//! verbose mode); tests subscribe to assert on exactly which procedures ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The tool provider process answered the handshake
    ToolsetReady {
        server: String,
        tool_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The tool provider could not be started; the agent runs without tools
    ToolsetUnavailable {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a reply
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was attempted
    ToolExecuted {
        tool_name: String,
        arguments: serde_json::Value,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
