use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AegisError, Result};

/// Unique session identifier. Distinct identifiers never share state; a
/// resolve run and a conversation run over the same alert get distinct ids.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which flow a session runs: full alert resolution, or a single
/// question-and-answer turn against the same alert context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Resolve,
    Conversation,
}

/// The fixed alert typologies. Each selects one adjudication rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioCode {
    VelocitySpike,
    Structuring,
    KycInconsistency,
    SanctionsHit,
    DormantReactivation,
}

impl ScenarioCode {
    /// The alert-series code used in rule ids and audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::VelocitySpike => "A-001",
            Self::Structuring => "A-002",
            Self::KycInconsistency => "A-003",
            Self::SanctionsHit => "A-004",
            Self::DormantReactivation => "A-005",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VelocitySpike => "Velocity Spike (Layering)",
            Self::Structuring => "Below-Threshold Structuring",
            Self::KycInconsistency => "KYC Inconsistency",
            Self::SanctionsHit => "Sanctions Watchlist Hit",
            Self::DormantReactivation => "Dormant Account Reactivation",
        }
    }

    /// Accepts both the series code ("A-004") and the symbolic name
    /// ("SANCTIONS_HIT") — alert feeds use either.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A-001" | "VELOCITY_SPIKE" => Ok(Self::VelocitySpike),
            "A-002" | "STRUCTURING" => Ok(Self::Structuring),
            "A-003" | "KYC_INCONSISTENCY" => Ok(Self::KycInconsistency),
            "A-004" | "SANCTIONS_HIT" => Ok(Self::SanctionsHit),
            "A-005" | "DORMANT_REACTIVATION" => Ok(Self::DormantReactivation),
            other => Err(AegisError::Config(format!("unknown scenario: {other}"))),
        }
    }
}

impl std::fmt::Display for ScenarioCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Immutable per-session input. Read-only to every agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertContext {
    pub alert_id: String,
    pub scenario: ScenarioCode,
    pub scenario_name: String,
    pub subject_id: String,
    pub trigger_details: String,
}

impl AlertContext {
    pub fn new(
        alert_id: impl Into<String>,
        scenario: ScenarioCode,
        subject_id: impl Into<String>,
        trigger_details: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            scenario,
            scenario_name: scenario.display_name().to_string(),
            subject_id: subject_id.into(),
            trigger_details: trigger_details.into(),
        }
    }
}

/// The agents that write findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentName {
    Investigator,
    ContextGatherer,
    Adjudicator,
    Conversational,
    Executor,
}

impl AgentName {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Investigator => "Investigator",
            Self::ContextGatherer => "Context Gatherer",
            Self::Adjudicator => "Adjudicator",
            Self::Conversational => "Conversational",
            Self::Executor => "Action Executor",
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An append-only evidence record. Never rewritten, never removed; ordering
/// is investigative order and every later node observes it unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub source: AgentName,
    pub content: String,
}

impl Finding {
    pub fn new(source: AgentName, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
        }
    }

    /// An error finding. Recoverable agent failures land in the audit trail
    /// as data rather than aborting the session.
    pub fn error(source: AgentName, message: impl std::fmt::Display) -> Self {
        Self {
            source,
            content: format!("ERROR: {message}"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.content.starts_with("ERROR:")
    }
}

/// The terminal decision for a resolution-flow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionAction {
    #[serde(rename = "ESCALATE_SAR")]
    EscalateSar,
    #[serde(rename = "RFI")]
    Rfi,
    // Older adjudication prompts emitted CamelCase; accept it on the wire.
    #[serde(rename = "FALSE_POSITIVE", alias = "FalsePositive")]
    FalsePositive,
    #[serde(rename = "BLOCK_ACCOUNT")]
    BlockAccount,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscalateSar => "ESCALATE_SAR",
            Self::Rfi => "RFI",
            Self::FalsePositive => "FALSE_POSITIVE",
            Self::BlockAccount => "BLOCK_ACCOUNT",
        }
    }
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Produced exactly once per session by the Adjudicator. A retry overwrites
/// it entirely; it is never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub action: ResolutionAction,
    pub rationale: String,
    pub confidence: f64,
    pub rule_id: String,
}

impl Resolution {
    /// The safe default when an adjudication output cannot be parsed: ask
    /// for more information rather than blocking the workflow.
    pub fn fallback(scenario: ScenarioCode, raw_output: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Rfi,
            rationale: raw_output.into(),
            confidence: 0.7,
            rule_id: scenario.code().to_string(),
        }
    }
}

/// Workflow graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    Router,
    Investigator,
    ContextGatherer,
    Adjudicator,
    Conversational,
    ActionExecutor,
    Terminal,
}

impl WorkflowNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Investigator => "investigator",
            Self::ContextGatherer => "context_gatherer",
            Self::Adjudicator => "adjudicator",
            Self::Conversational => "conversational",
            Self::ActionExecutor => "action_executor",
            Self::Terminal => "terminal",
        }
    }

    /// Parse a directive value from a routing strategy. "FINISH" is the
    /// wire spelling generative strategies use for the terminal state.
    pub fn parse_directive(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "router" | "supervisor" => Ok(Self::Router),
            "investigator" => Ok(Self::Investigator),
            "context_gatherer" => Ok(Self::ContextGatherer),
            "adjudicator" => Ok(Self::Adjudicator),
            "conversational" => Ok(Self::Conversational),
            "action_executor" => Ok(Self::ActionExecutor),
            "terminal" | "finish" | "end" => Ok(Self::Terminal),
            other => Err(AegisError::UnknownNode(other.to_string())),
        }
    }
}

impl std::fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ephemeral routing decision. Overwritten every step; only the current
/// value is kept, never a history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDirective {
    pub next: WorkflowNode,
    pub reasoning: String,
}

impl RoutingDirective {
    pub fn new(next: WorkflowNode, reasoning: impl Into<String>) -> Self {
        Self {
            next,
            reasoning: reasoning.into(),
        }
    }
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn in the interactive flow. Append-only; a session can accumulate
/// turns without ever producing a Resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Concrete side effects the Action Executor dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundAction {
    RfiNotice,
    IvrCallback,
    SarFiling,
    CaseToHumanQueue,
    ClosureRecord,
    AccountFreeze,
    SanctionsTeamNotice,
    LegalEscalation,
}

impl OutboundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RfiNotice => "rfi_notice",
            Self::IvrCallback => "ivr_callback",
            Self::SarFiling => "sar_filing",
            Self::CaseToHumanQueue => "case_to_human_queue",
            Self::ClosureRecord => "closure_record",
            Self::AccountFreeze => "account_freeze",
            Self::SanctionsTeamNotice => "sanctions_team_notice",
            Self::LegalEscalation => "legal_escalation",
        }
    }
}

/// Audit record of the executed terminal action. Recomputable from the
/// persisted Resolution during a resume, so it lives in an overwrite field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub alert_id: String,
    pub action: ResolutionAction,
    pub dispatched: Vec<OutboundAction>,
    pub executed_at: DateTime<Utc>,
}

/// Why a run stopped without reaching Terminal. The session stays
/// resumable from its last checkpoint in both cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StuckReason {
    /// The global iteration cap was hit on the step that would exceed it.
    IterationBudget { limit: u32 },
    /// One node failed this many times in a row.
    NodeRetriesExhausted { node: WorkflowNode, failures: u32 },
}

impl std::fmt::Display for StuckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IterationBudget { limit } => {
                write!(f, "iteration budget of {limit} exhausted")
            }
            Self::NodeRetriesExhausted { node, failures } => {
                write!(f, "node {node} failed {failures} consecutive times")
            }
        }
    }
}

/// Final status of one engine run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Resolution flow reached Terminal with an executed resolution.
    Completed {
        resolution: Resolution,
        execution: Option<ExecutionRecord>,
    },
    /// Conversation flow reached Terminal with a response.
    Conversation { response: String },
    /// The run was aborted as stuck; not a success and not a failure —
    /// distinct from both, and never conflated with a Resolution.
    Stuck { reason: StuckReason },
}

/// Result of a lookup capability call. "Not found" is an explicit value,
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LookupOutcome {
    Found(serde_json::Value),
    NotFound,
}

impl LookupOutcome {
    pub fn found(value: serde_json::Value) -> Self {
        Self::Found(value)
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_parses_both_spellings() {
        assert_eq!(
            ScenarioCode::parse("A-004").unwrap(),
            ScenarioCode::SanctionsHit
        );
        assert_eq!(
            ScenarioCode::parse("sanctions_hit").unwrap(),
            ScenarioCode::SanctionsHit
        );
        assert!(ScenarioCode::parse("A-999").is_err());
    }

    #[test]
    fn action_wire_format() {
        let json = serde_json::to_string(&ResolutionAction::EscalateSar).unwrap();
        assert_eq!(json, "\"ESCALATE_SAR\"");

        // Legacy CamelCase alias still deserializes
        let action: ResolutionAction = serde_json::from_str("\"FalsePositive\"").unwrap();
        assert_eq!(action, ResolutionAction::FalsePositive);
    }

    #[test]
    fn directive_parse_allows_finish() {
        assert_eq!(
            WorkflowNode::parse_directive("FINISH").unwrap(),
            WorkflowNode::Terminal
        );
        assert!(WorkflowNode::parse_directive("frobnicator").is_err());
    }

    #[test]
    fn fallback_resolution_shape() {
        let r = Resolution::fallback(ScenarioCode::Structuring, "garbled output");
        assert_eq!(r.action, ResolutionAction::Rfi);
        assert_eq!(r.confidence, 0.7);
        assert_eq!(r.rule_id, "A-002");
        assert_eq!(r.rationale, "garbled output");
    }

    #[test]
    fn error_findings_are_tagged() {
        let f = Finding::error(AgentName::Investigator, "lookup timed out");
        assert!(f.is_error());
        assert!(f.content.contains("lookup timed out"));
    }
}
