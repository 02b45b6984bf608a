use serde::{Deserialize, Serialize};

use crate::types::{
    AgentName, AlertContext, ConversationTurn, ExecutionRecord, Finding, Resolution,
    RoutingDirective, RunMode, SessionId, WorkflowNode,
};

/// Update intent for an overwriting field. `Keep` (the default) leaves the
/// current value untouched; `Set` replaces it entirely; `Clear` replaces it
/// with absent. There is no merge for these fields, only replacement.
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(v) => *slot = Some(v),
            Self::Clear => *slot = None,
        }
    }
}

/// A partial update produced by one node execution. Accumulating fields
/// append; overwriting fields replace. Re-submitting an already committed
/// update duplicates its accumulating entries, so callers must not.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub findings: Vec<Finding>,
    pub conversation_turns: Vec<ConversationTurn>,
    pub resolution: Patch<Resolution>,
    pub directive: Patch<RoutingDirective>,
    pub conversation_response: Patch<String>,
    pub execution: Patch<ExecutionRecord>,
}

impl StateUpdate {
    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn with_turn(mut self, turn: ConversationTurn) -> Self {
        self.conversation_turns.push(turn);
        self
    }

    pub fn with_directive(mut self, next: WorkflowNode, reasoning: impl Into<String>) -> Self {
        self.directive = Patch::Set(RoutingDirective::new(next, reasoning));
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Patch::Set(resolution);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.conversation_response = Patch::Set(response.into());
        self
    }

    pub fn with_execution(mut self, record: ExecutionRecord) -> Self {
        self.execution = Patch::Set(record);
        self
    }
}

/// The shared context threaded through every step of a session. Owned by
/// exactly one node execution at a time; between steps, ownership rests
/// with the checkpoint layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub mode: RunMode,
    pub alert: AlertContext,
    #[serde(default)]
    pub user_query: Option<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub directive: Option<RoutingDirective>,
    #[serde(default)]
    pub conversation_turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub conversation_response: Option<String>,
    #[serde(default)]
    pub execution: Option<ExecutionRecord>,
}

impl SessionState {
    pub fn new_resolve(session_id: SessionId, alert: AlertContext) -> Self {
        Self {
            session_id,
            mode: RunMode::Resolve,
            alert,
            user_query: None,
            findings: Vec::new(),
            resolution: None,
            directive: None,
            conversation_turns: Vec::new(),
            conversation_response: None,
            execution: None,
        }
    }

    pub fn new_conversation(
        session_id: SessionId,
        alert: AlertContext,
        query: impl Into<String>,
    ) -> Self {
        Self {
            mode: RunMode::Conversation,
            user_query: Some(query.into()),
            ..Self::new_resolve(session_id, alert)
        }
    }

    /// Pure merge of a partial update into a snapshot. Appending fields keep
    /// their order; overwriting fields replace only when the update says so.
    /// Idempotent for overwriting fields, not for accumulating ones.
    #[must_use]
    pub fn apply(&self, update: StateUpdate) -> SessionState {
        let mut next = self.clone();
        next.findings.extend(update.findings);
        next.conversation_turns.extend(update.conversation_turns);
        update.resolution.apply_to(&mut next.resolution);
        update.directive.apply_to(&mut next.directive);
        update
            .conversation_response
            .apply_to(&mut next.conversation_response);
        update.execution.apply_to(&mut next.execution);
        next
    }

    /// Whether any non-error finding from the given agent is on file.
    pub fn has_findings_from(&self, agent: AgentName) -> bool {
        self.findings
            .iter()
            .any(|f| f.source == agent && !f.is_error())
    }
}
