//! Adjudicator agent: runs the configured decision strategy over the
//! findings, degrades unparseable output to the safe default, and guards
//! the BLOCK_ACCOUNT action behind confirmed sanctions evidence.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use aegis_core::state::{SessionState, StateUpdate};
use aegis_core::traits::{AgentStep, DecisionOutput, DecisionStrategy};
use aegis_core::types::{
    AgentName, Finding, Resolution, ResolutionAction, ScenarioCode, WorkflowNode,
};

use crate::rules::{facts, EvidenceSummary, SANCTIONS_CONFIDENCE_THRESHOLD};

pub struct Adjudicator {
    strategy: Arc<dyn DecisionStrategy>,
}

impl Adjudicator {
    pub fn new(strategy: Arc<dyn DecisionStrategy>) -> Self {
        Self { strategy }
    }
}

impl AgentStep for Adjudicator {
    fn node(&self) -> WorkflowNode {
        WorkflowNode::Adjudicator
    }

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate> {
        let state = state.clone();
        Box::pin(async move {
            match self.strategy.decide(&state.alert, &state.findings).await {
                Ok(output) => {
                    let resolution = match output {
                        DecisionOutput::Resolved(r) => r,
                        DecisionOutput::Unparsed(raw) => {
                            warn!(
                                alert = %state.alert.alert_id,
                                "Adjudication output unparseable, applying safe default"
                            );
                            Resolution::fallback(state.alert.scenario, raw)
                        }
                    };
                    let resolution = guard_block_account(&state, resolution);
                    info!(
                        alert = %state.alert.alert_id,
                        action = resolution.action.as_str(),
                        rule = %resolution.rule_id,
                        confidence = resolution.confidence,
                        "Resolution reached"
                    );
                    StateUpdate::default()
                        .with_finding(Finding::new(
                            AgentName::Adjudicator,
                            format!("Decision: {}", resolution.action),
                        ))
                        .with_resolution(resolution)
                        .with_directive(WorkflowNode::ActionExecutor, "resolution reached")
                }
                Err(e) => {
                    warn!(error = %e, "Adjudicator step failed");
                    StateUpdate::default()
                        .with_finding(Finding::error(AgentName::Adjudicator, &e))
                        .with_directive(WorkflowNode::Adjudicator, "adjudication failed, retrying")
                }
            }
        })
    }
}

/// BLOCK_ACCOUNT is licensed only by a confirmed watchlist match above the
/// high-confidence threshold on the current evidence; anything else is
/// rewritten to ESCALATE_SAR for human review.
fn guard_block_account(state: &SessionState, resolution: Resolution) -> Resolution {
    if resolution.action != ResolutionAction::BlockAccount {
        return resolution;
    }

    let evidence = EvidenceSummary::from_findings(&state.findings);
    let confidence = evidence.number(facts::WATCHLIST_CONFIDENCE).unwrap_or(0.0);
    let licensed = state.alert.scenario == ScenarioCode::SanctionsHit
        && evidence.flag(facts::WATCHLIST_CONFIRMED)
        && confidence > SANCTIONS_CONFIDENCE_THRESHOLD;
    if licensed {
        return resolution;
    }

    warn!(
        alert = %state.alert.alert_id,
        confidence,
        "BLOCK_ACCOUNT without confirmed watchlist evidence, rewriting to ESCALATE_SAR"
    );
    Resolution {
        action: ResolutionAction::EscalateSar,
        rationale: format!(
            "BLOCK_ACCOUNT withheld: no confirmed watchlist match above \
             {SANCTIONS_CONFIDENCE_THRESHOLD:.2} confidence on file. Original rationale: {}",
            resolution.rationale
        ),
        confidence: resolution.confidence.min(0.85),
        rule_id: resolution.rule_id,
    }
}
