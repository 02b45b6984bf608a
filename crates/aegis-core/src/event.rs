use crate::types::{ResolutionAction, SessionId, WorkflowNode};

/// Workflow event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Engine run started.
    RunStarted { session_id: SessionId },
    /// A node began executing.
    NodeStarted { node: WorkflowNode, step: u32 },
    /// A node finished and its update was merged.
    NodeCompleted { node: WorkflowNode, step: u32 },
    /// A node failed and routed back to itself.
    NodeRetry { node: WorkflowNode, failures: u32 },
    /// The router chose the next node.
    DirectiveChosen { next: WorkflowNode, reasoning: String },
    /// A snapshot was durably written.
    CheckpointSaved { session_id: SessionId, step: u32 },
    /// A terminal side effect was dispatched.
    ActionDispatched { action: &'static str },
    /// Run reached Terminal.
    RunCompleted {
        session_id: SessionId,
        action: Option<ResolutionAction>,
    },
    /// Run aborted as stuck; last checkpoint preserved.
    RunStuck { session_id: SessionId, reason: String },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
