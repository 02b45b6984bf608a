//! The workflow engine: a strictly sequential node loop. The router picks
//! the next agent through an explicit allow-list; after every node the
//! durable checkpoint write completes before the next directive is acted
//! on, so a crash at any point resumes from the last committed step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use aegis_core::config::WorkflowConfig;
use aegis_core::error::{AegisError, Result};
use aegis_core::event::{EventBus, WorkflowEvent};
use aegis_core::state::{Patch, SessionState, StateUpdate};
use aegis_core::traits::{AgentStep, CheckpointRecord, Checkpointer, RouteStrategy};
use aegis_core::types::{RunMode, RunOutcome, SessionId, StuckReason, WorkflowNode};

pub struct WorkflowEngine {
    router: Arc<dyn RouteStrategy>,
    agents: HashMap<WorkflowNode, Arc<dyn AgentStep>>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    events: Arc<EventBus>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(router: Arc<dyn RouteStrategy>, config: WorkflowConfig) -> Self {
        Self {
            router,
            agents: HashMap::new(),
            checkpointer: None,
            events: Arc::new(EventBus::default()),
            config,
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn AgentStep>) -> Self {
        self.agents.insert(agent.node(), agent);
        self
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run a fresh session from the Router entry node.
    pub async fn run(&self, state: SessionState) -> Result<RunOutcome> {
        self.run_from(state, WorkflowNode::Router, 0).await
    }

    /// Resume a session from its last committed checkpoint. The iteration
    /// budget applies per run, so a budget-stuck session gets a fresh
    /// budget here; only the checkpoint step numbering carries over.
    pub async fn resume(&self, session_id: &SessionId) -> Result<RunOutcome> {
        let checkpointer = self
            .checkpointer
            .as_ref()
            .ok_or_else(|| AegisError::Checkpoint("checkpointing is disabled".into()))?;
        let record = checkpointer.load(session_id)?.ok_or_else(|| {
            AegisError::Checkpoint(format!("no checkpoint for session {session_id}"))
        })?;
        info!(session = %session_id, step = record.step, next = %record.next_node, "Resuming session");
        self.run_from(record.state, record.next_node, record.step)
            .await
    }

    async fn run_from(
        &self,
        mut state: SessionState,
        mut node: WorkflowNode,
        mut step: u32,
    ) -> Result<RunOutcome> {
        self.events.publish(WorkflowEvent::RunStarted {
            session_id: state.session_id.clone(),
        });

        // Consecutive-failure counts, reset on any successful pass.
        let mut failures: HashMap<WorkflowNode, u32> = HashMap::new();
        // Executions this run; `step` keeps numbering checkpoints across
        // resumes, the budget starts over.
        let mut executed: u32 = 0;

        loop {
            if node == WorkflowNode::Terminal {
                return self.finish(state);
            }

            // Budget is counted in node executions; the step that would
            // exceed it never runs.
            if executed >= self.config.max_iterations {
                let reason = StuckReason::IterationBudget {
                    limit: self.config.max_iterations,
                };
                warn!(session = %state.session_id, %reason, "Run aborted");
                self.events.publish(WorkflowEvent::RunStuck {
                    session_id: state.session_id.clone(),
                    reason: reason.to_string(),
                });
                return Ok(RunOutcome::Stuck { reason });
            }
            executed += 1;
            step += 1;
            self.events
                .publish(WorkflowEvent::NodeStarted { node, step });

            let next = if node == WorkflowNode::Router {
                let directive = self.router.route(&state).await?;
                let next = directive.next;
                if !matches!(
                    next,
                    WorkflowNode::Investigator
                        | WorkflowNode::ContextGatherer
                        | WorkflowNode::Adjudicator
                        | WorkflowNode::Conversational
                        | WorkflowNode::Terminal
                ) {
                    return Err(AegisError::InvalidDirective(format!(
                        "router proposed {next}, which is not a routable node"
                    )));
                }
                debug!(next = %next, reasoning = %directive.reasoning, "Directive chosen");
                self.events.publish(WorkflowEvent::DirectiveChosen {
                    next,
                    reasoning: directive.reasoning.clone(),
                });
                let mut update = StateUpdate::default();
                update.directive = Patch::Set(directive);
                state = state.apply(update);
                next
            } else {
                let agent = self.agents.get(&node).ok_or_else(|| {
                    AegisError::InvalidDirective(format!("no agent registered for node {node}"))
                })?;

                let update = agent.step(&state).await;
                let proposed = match &update.directive {
                    Patch::Set(d) => Some(d.next),
                    Patch::Keep | Patch::Clear => None,
                };
                let had_execution = state.execution.is_some();
                state = state.apply(update);

                if !had_execution {
                    if let Some(record) = &state.execution {
                        for action in &record.dispatched {
                            self.events.publish(WorkflowEvent::ActionDispatched {
                                action: action.as_str(),
                            });
                        }
                    }
                }

                // An agent may continue to the router, retry itself, or
                // hand off to its fixed successor; nothing else.
                let next = proposed.unwrap_or(WorkflowNode::Router);
                let allowed = next == node
                    || next == WorkflowNode::Router
                    || fixed_successor(node) == Some(next);
                if !allowed {
                    return Err(AegisError::InvalidDirective(format!(
                        "{node} proposed {next}, which is not an allowed transition"
                    )));
                }
                next
            };

            self.events
                .publish(WorkflowEvent::NodeCompleted { node, step });

            // The recovery boundary: commit before acting on the directive.
            if let Some(checkpointer) = &self.checkpointer {
                checkpointer.save(&CheckpointRecord {
                    session_id: state.session_id.clone(),
                    step,
                    next_node: next,
                    state: state.clone(),
                    timestamp: Utc::now(),
                })?;
                self.events.publish(WorkflowEvent::CheckpointSaved {
                    session_id: state.session_id.clone(),
                    step,
                });
            }

            // A self-route is the failure signal; anything else resets
            // the node's consecutive-failure count.
            if next == node {
                let count = failures.entry(node).or_insert(0);
                *count += 1;
                self.events.publish(WorkflowEvent::NodeRetry {
                    node,
                    failures: *count,
                });
                if *count >= self.config.max_node_retries {
                    let reason = StuckReason::NodeRetriesExhausted {
                        node,
                        failures: *count,
                    };
                    warn!(session = %state.session_id, %reason, "Run aborted");
                    self.events.publish(WorkflowEvent::RunStuck {
                        session_id: state.session_id.clone(),
                        reason: reason.to_string(),
                    });
                    return Ok(RunOutcome::Stuck { reason });
                }
            } else {
                failures.insert(node, 0);
            }

            node = next;
        }
    }

    fn finish(&self, state: SessionState) -> Result<RunOutcome> {
        match state.mode {
            RunMode::Resolve => {
                let resolution = state.resolution.clone().ok_or_else(|| {
                    AegisError::InvalidDirective(
                        "terminal reached without a resolution in resolve mode".into(),
                    )
                })?;
                info!(
                    session = %state.session_id,
                    action = resolution.action.as_str(),
                    "Run completed"
                );
                self.events.publish(WorkflowEvent::RunCompleted {
                    session_id: state.session_id.clone(),
                    action: Some(resolution.action),
                });
                Ok(RunOutcome::Completed {
                    resolution,
                    execution: state.execution,
                })
            }
            RunMode::Conversation => {
                let response = state.conversation_response.clone().unwrap_or_default();
                self.events.publish(WorkflowEvent::RunCompleted {
                    session_id: state.session_id.clone(),
                    action: None,
                });
                Ok(RunOutcome::Conversation { response })
            }
        }
    }
}

/// Fixed successors outside the return-to-router default.
fn fixed_successor(node: WorkflowNode) -> Option<WorkflowNode> {
    match node {
        WorkflowNode::Adjudicator => Some(WorkflowNode::ActionExecutor),
        WorkflowNode::Conversational => Some(WorkflowNode::Terminal),
        WorkflowNode::ActionExecutor => Some(WorkflowNode::Terminal),
        _ => None,
    }
}
