//! Action executor: turns the stored resolution into concrete outbound
//! actions through the `ActionDispatcher` seam and records what was
//! dispatched.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{error, info, warn};

use aegis_core::error::Result;
use aegis_core::state::{SessionState, StateUpdate};
use aegis_core::traits::{ActionDispatcher, AgentStep};
use aegis_core::types::{
    AgentName, AlertContext, ExecutionRecord, Finding, OutboundAction, ResolutionAction,
    ScenarioCode, WorkflowNode,
};

/// The outbound actions a resolution expands into. RFI on a dormant
/// reactivation additionally places an IVR callback.
pub fn planned_actions(scenario: ScenarioCode, action: ResolutionAction) -> Vec<OutboundAction> {
    match action {
        ResolutionAction::Rfi => {
            let mut actions = vec![OutboundAction::RfiNotice];
            if scenario == ScenarioCode::DormantReactivation {
                actions.push(OutboundAction::IvrCallback);
            }
            actions
        }
        ResolutionAction::EscalateSar => {
            vec![OutboundAction::SarFiling, OutboundAction::CaseToHumanQueue]
        }
        ResolutionAction::FalsePositive => vec![OutboundAction::ClosureRecord],
        ResolutionAction::BlockAccount => vec![
            OutboundAction::AccountFreeze,
            OutboundAction::SanctionsTeamNotice,
            OutboundAction::LegalEscalation,
        ],
    }
}

/// Production dispatcher: structured log lines stand in for the outbound
/// integrations (email, case queue, core banking).
pub struct LogDispatcher;

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&self, alert: &AlertContext, action: OutboundAction) -> BoxFuture<'_, Result<()>> {
        let alert_id = alert.alert_id.clone();
        let subject = alert.subject_id.clone();
        Box::pin(async move {
            match action {
                OutboundAction::AccountFreeze => {
                    error!(alert = %alert_id, subject = %subject, "ACCOUNT FROZEN")
                }
                OutboundAction::SarFiling => {
                    warn!(alert = %alert_id, subject = %subject, "SAR filed")
                }
                other => {
                    info!(alert = %alert_id, subject = %subject, action = other.as_str(), "Outbound action dispatched")
                }
            }
            Ok(())
        })
    }
}

pub struct ActionExecutor {
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl ActionExecutor {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn execute(&self, state: &SessionState) -> Result<ExecutionRecord> {
        let resolution = state.resolution.as_ref().ok_or_else(|| {
            aegis_core::AegisError::Dispatch("no resolution on file to execute".into())
        })?;

        let actions = planned_actions(state.alert.scenario, resolution.action);
        let mut dispatched = Vec::with_capacity(actions.len());
        for action in actions {
            self.dispatcher.dispatch(&state.alert, action).await?;
            dispatched.push(action);
        }

        Ok(ExecutionRecord {
            alert_id: state.alert.alert_id.clone(),
            action: resolution.action,
            dispatched,
            executed_at: Utc::now(),
        })
    }
}

impl AgentStep for ActionExecutor {
    fn node(&self) -> WorkflowNode {
        WorkflowNode::ActionExecutor
    }

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate> {
        let state = state.clone();
        Box::pin(async move {
            match self.execute(&state).await {
                Ok(record) => {
                    info!(
                        alert = %record.alert_id,
                        action = record.action.as_str(),
                        count = record.dispatched.len(),
                        "Actions dispatched"
                    );
                    StateUpdate::default()
                        .with_execution(record)
                        .with_directive(WorkflowNode::Terminal, "actions dispatched")
                }
                Err(e) => {
                    warn!(error = %e, "Action execution failed");
                    StateUpdate::default()
                        .with_finding(Finding::error(AgentName::Executor, &e))
                        .with_directive(
                            WorkflowNode::ActionExecutor,
                            "action execution failed, retrying",
                        )
                }
            }
        })
    }
}
