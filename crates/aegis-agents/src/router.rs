//! Routing strategies. The deterministic router is canonical; the
//! generative router asks the model but falls back to the deterministic
//! order on any failure, so behavior under failure stays predictable.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use aegis_core::config::ModelConfig;
use aegis_core::error::Result;
use aegis_core::state::SessionState;
use aegis_core::traits::{LlmClient, RouteStrategy};
use aegis_core::types::{AgentName, RoutingDirective, RunMode, WorkflowNode};
use aegis_llm::extract_json_object;

use crate::rules::{facts, EvidenceSummary};

/// Fixed routing order: conversation mode first, then evidence gathering
/// in sequence, then adjudication, then done. A confirmed watchlist match
/// jumps straight to adjudication.
pub struct DeterministicRouter;

impl DeterministicRouter {
    pub fn directive(state: &SessionState) -> RoutingDirective {
        if state.mode == RunMode::Conversation {
            return RoutingDirective::new(
                WorkflowNode::Conversational,
                "conversation mode, routing to the conversational agent",
            );
        }

        if state.resolution.is_none() && confirmed_watchlist_hit(state) {
            return RoutingDirective::new(
                WorkflowNode::Adjudicator,
                "confirmed watchlist match on file, adjudicating immediately",
            );
        }

        if !state.has_findings_from(AgentName::Investigator) {
            RoutingDirective::new(WorkflowNode::Investigator, "transaction analysis needed")
        } else if !state.has_findings_from(AgentName::ContextGatherer) {
            RoutingDirective::new(WorkflowNode::ContextGatherer, "customer context needed")
        } else if state.resolution.is_none() {
            RoutingDirective::new(WorkflowNode::Adjudicator, "evidence complete, adjudicating")
        } else {
            RoutingDirective::new(WorkflowNode::Terminal, "resolution on file, finishing")
        }
    }
}

impl RouteStrategy for DeterministicRouter {
    fn route(&self, state: &SessionState) -> BoxFuture<'_, Result<RoutingDirective>> {
        let directive = Self::directive(state);
        Box::pin(async move { Ok(directive) })
    }
}

fn confirmed_watchlist_hit(state: &SessionState) -> bool {
    EvidenceSummary::from_findings(&state.findings).flag(facts::WATCHLIST_CONFIRMED)
}

const SYSTEM_PROMPT: &str = "\
You are the supervisor of Aegis, an alert-resolution system. You control a \
team of specialized agents.

YOUR TEAM:
- investigator: queries transaction history, linked accounts, dormancy
- context_gatherer: retrieves KYC profiles, adverse media, watchlists
- adjudicator: makes the final resolution decision
- conversational: answers analyst questions about the alert

ROUTING RULES:
- If mode is conversation -> route to conversational
- If no transaction analysis done -> route to investigator
- If investigator done but no KYC/watchlist check -> route to context_gatherer
- If both done but no decision -> route to adjudicator
- If a resolution exists -> route to FINISH

EMERGENCY: for a confirmed watchlist match, route straight to adjudicator.

Respond with ONLY a JSON object:
{\"next\": \"<agent or FINISH>\", \"reasoning\": \"<brief explanation>\"}

Valid values: investigator, context_gatherer, adjudicator, conversational, FINISH";

/// Model-driven router. Parsed output must name a known node; anything
/// else (request failure, no JSON, unknown node) falls back to the
/// deterministic directive for the same state.
pub struct GenerativeRouter {
    client: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl GenerativeRouter {
    pub fn new(client: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { client, model }
    }
}

impl RouteStrategy for GenerativeRouter {
    fn route(&self, state: &SessionState) -> BoxFuture<'_, Result<RoutingDirective>> {
        let state = state.clone();
        Box::pin(async move {
            let findings_summary = if state.findings.is_empty() {
                "No findings yet".to_string()
            } else {
                state
                    .findings
                    .iter()
                    .map(|f| format!("[{}] {}", f.source, f.content))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let resolution_status = match &state.resolution {
                Some(r) => format!("{} ({})", r.action, r.rule_id),
                None => "No resolution yet".to_string(),
            };
            let user_prompt = format!(
                "CURRENT STATE:\n- Mode: {:?}\n- Alert ID: {}\n- Scenario: {} - {}\n\
                 - User query: {}\n\nINVESTIGATION PROGRESS:\n{}\n\n\
                 RESOLUTION STATUS:\n{}\n\n\
                 Decide which agent should work next. Respond with JSON only.",
                state.mode,
                state.alert.alert_id,
                state.alert.scenario.code(),
                state.alert.scenario_name,
                state.user_query.as_deref().unwrap_or("N/A"),
                findings_summary,
                resolution_status,
            );

            match self
                .client
                .complete(&self.model, SYSTEM_PROMPT, &user_prompt)
                .await
            {
                Ok(text) => match parse_directive(&text) {
                    Some(directive) => {
                        debug!(next = %directive.next, "Generative route chosen");
                        Ok(directive)
                    }
                    None => {
                        warn!("Generative router output unparseable, using deterministic order");
                        Ok(DeterministicRouter::directive(&state))
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Generative router failed, using deterministic order");
                    Ok(DeterministicRouter::directive(&state))
                }
            }
        })
    }
}

fn parse_directive(text: &str) -> Option<RoutingDirective> {
    let value = extract_json_object(text)?;
    let next = WorkflowNode::parse_directive(value.get("next")?.as_str()?).ok()?;
    let reasoning = value
        .get("reasoning")
        .and_then(|r| r.as_str())
        .unwrap_or("no reasoning provided")
        .to_string();
    Some(RoutingDirective { next, reasoning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::state::StateUpdate;
    use aegis_core::types::{Finding, Resolution, ResolutionAction, ScenarioCode, SessionId};
    use aegis_test_utils::{demo_alert, test_model_config, ScriptedLlm};

    fn resolve_state() -> SessionState {
        SessionState::new_resolve(SessionId::new(), demo_alert(ScenarioCode::VelocitySpike))
    }

    fn with_finding(state: SessionState, source: AgentName, content: &str) -> SessionState {
        state.apply(StateUpdate::default().with_finding(Finding::new(source, content)))
    }

    #[tokio::test]
    async fn deterministic_order_walks_the_pipeline() {
        let router = DeterministicRouter;
        let state = resolve_state();
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Investigator
        );

        let state = with_finding(state, AgentName::Investigator, "total_transactions: 4");
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::ContextGatherer
        );

        let state = with_finding(state, AgentName::ContextGatherer, "risk_rating: Low");
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Adjudicator
        );

        let state = state.apply(StateUpdate::default().with_resolution(Resolution {
            action: ResolutionAction::FalsePositive,
            rationale: "done".into(),
            confidence: 0.8,
            rule_id: "A-001.2".into(),
        }));
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Terminal
        );
    }

    #[tokio::test]
    async fn error_findings_do_not_advance_the_order() {
        let router = DeterministicRouter;
        let state = resolve_state().apply(
            StateUpdate::default()
                .with_finding(Finding::error(AgentName::Investigator, "lookup down")),
        );
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Investigator
        );
    }

    #[tokio::test]
    async fn conversation_mode_routes_to_conversational() {
        let router = DeterministicRouter;
        let state = SessionState::new_conversation(
            SessionId::new(),
            demo_alert(ScenarioCode::VelocitySpike),
            "why was this flagged?",
        );
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Conversational
        );
    }

    #[tokio::test]
    async fn confirmed_watchlist_hit_bypasses_remaining_gathering() {
        let router = DeterministicRouter;
        let state = SessionState::new_resolve(
            SessionId::new(),
            demo_alert(ScenarioCode::SanctionsHit),
        );
        // Context gatherer ran first and found a confirmed match; the
        // investigator has not run yet.
        let state = with_finding(
            state,
            AgentName::ContextGatherer,
            "watchlist_confidence: 0.98\nwatchlist_confirmed: true",
        );
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::Adjudicator
        );
    }

    #[tokio::test]
    async fn generative_router_uses_model_directive() {
        let llm = ScriptedLlm::new()
            .respond("{\"next\": \"context_gatherer\", \"reasoning\": \"need KYC\"}");
        let router = GenerativeRouter::new(Arc::new(llm), test_model_config());
        let directive = router.route(&resolve_state()).await.unwrap();
        assert_eq!(directive.next, WorkflowNode::ContextGatherer);
        assert_eq!(directive.reasoning, "need KYC");
    }

    #[tokio::test]
    async fn generative_router_accepts_finish() {
        let llm = ScriptedLlm::new().respond("{\"next\": \"FINISH\", \"reasoning\": \"done\"}");
        let router = GenerativeRouter::new(Arc::new(llm), test_model_config());
        let directive = router.route(&resolve_state()).await.unwrap();
        assert_eq!(directive.next, WorkflowNode::Terminal);
    }

    #[tokio::test]
    async fn unparseable_model_output_falls_back_deterministically() {
        let llm = ScriptedLlm::new().respond("let me think about that...");
        let router = GenerativeRouter::new(Arc::new(llm), test_model_config());
        let state = with_finding(
            resolve_state(),
            AgentName::Investigator,
            "total_transactions: 4",
        );
        // Deterministic order: investigator done, context gatherer next.
        assert_eq!(
            router.route(&state).await.unwrap().next,
            WorkflowNode::ContextGatherer
        );
    }

    #[tokio::test]
    async fn model_failure_falls_back_deterministically() {
        let llm = ScriptedLlm::new().fail("rate limited");
        let router = GenerativeRouter::new(Arc::new(llm), test_model_config());
        let directive = router.route(&resolve_state()).await.unwrap();
        assert_eq!(directive.next, WorkflowNode::Investigator);
    }
}
