use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::state::{SessionState, StateUpdate};
use crate::types::*;

/// LLM client — single-shot chat completion for reasoning steps.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a system + user prompt pair, return the assistant text.
    fn complete(
        &self,
        config: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> BoxFuture<'_, Result<String>>;
}

/// External data-lookup capability. Pure function of subject id plus
/// optional parameters; "not found" is an explicit outcome, not an error.
///
/// There is deliberately no per-call timeout: the engine suspends at each
/// lookup until it returns or errors.
pub trait LookupCapability: Send + Sync + 'static {
    /// Capability name (used for registry lookup and audit logging).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    fn lookup(
        &self,
        subject_id: &str,
        params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>>;
}

/// Common step contract for every capability agent and the action executor.
///
/// A step never fails from the engine's point of view: internal failures
/// are converted into an error Finding plus a self-routing directive so the
/// failed step stays confined and retryable.
pub trait AgentStep: Send + Sync + 'static {
    /// The graph node this step implements.
    fn node(&self) -> WorkflowNode;

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate>;
}

/// Routing strategy behind the Router. The deterministic implementation is
/// canonical; a generative implementation must fall back to it on any
/// failure so behavior under primary-strategy failure stays deterministic.
pub trait RouteStrategy: Send + Sync + 'static {
    fn route(&self, state: &SessionState) -> BoxFuture<'_, Result<RoutingDirective>>;
}

/// What an adjudication strategy produced.
#[derive(Debug, Clone)]
pub enum DecisionOutput {
    /// A well-formed resolution.
    Resolved(Resolution),
    /// Raw output that did not parse into the Resolution shape (or no rule
    /// guard matched). The adjudicator degrades this to the safe default.
    Unparsed(String),
}

/// Pluggable decision procedure behind the Adjudicator: rule engine or a
/// generative reasoning step, same contract either way.
pub trait DecisionStrategy: Send + Sync + 'static {
    fn decide(
        &self,
        alert: &AlertContext,
        findings: &[Finding],
    ) -> BoxFuture<'_, Result<DecisionOutput>>;
}

/// Side-effect seam for the Action Executor. Production dispatch notifies
/// external systems; tests capture the calls.
pub trait ActionDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        alert: &AlertContext,
        action: OutboundAction,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Durable snapshot of a session between steps: the state plus the node to
/// execute next, so recovery resumes from the exact point.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub session_id: SessionId,
    /// Number of node executions committed so far.
    pub step: u32,
    pub next_node: WorkflowNode,
    pub state: SessionState,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// One row in a checkpoint listing.
#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub session_id: SessionId,
    pub step: u32,
    pub next_node: WorkflowNode,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Checkpoint persistence. The engine's recovery boundary: the durable
/// write must complete before the next directive is requested.
pub trait Checkpointer: Send + Sync + 'static {
    /// Persist the latest snapshot for a session (replaces any prior one).
    fn save(&self, record: &CheckpointRecord) -> Result<()>;

    /// Load the latest snapshot, or None for an unknown session id.
    fn load(&self, session_id: &SessionId) -> Result<Option<CheckpointRecord>>;

    /// Drop all snapshots for a session. Returns how many were removed.
    fn delete(&self, session_id: &SessionId) -> Result<usize>;

    /// Summaries of every stored session, newest first.
    fn list(&self) -> Result<Vec<CheckpointSummary>>;
}
