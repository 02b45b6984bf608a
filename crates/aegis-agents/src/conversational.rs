//! Conversational agent: answers analyst questions about an alert, with
//! the customer profile pulled in as context. Always routes to Terminal,
//! even on failure — a broken answer ends the turn, it does not loop.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use aegis_core::config::ModelConfig;
use aegis_core::state::{SessionState, StateUpdate};
use aegis_core::traits::{AgentStep, LlmClient};
use aegis_core::types::{ConversationTurn, TurnRole, WorkflowNode};
use aegis_lookup::{names, LookupSet};

const SYSTEM_PROMPT: &str = "\
You are the Aegis conversational agent. Answer analyst questions about \
AML alerts conversationally. Be professional and thorough; cite the alert \
context and customer profile you are given. You are an AML expert assistant.";

/// How many prior turns are replayed into the prompt.
const HISTORY_WINDOW: usize = 6;

pub struct Conversational {
    client: Arc<dyn LlmClient>,
    model: ModelConfig,
    lookups: Arc<LookupSet>,
}

impl Conversational {
    pub fn new(client: Arc<dyn LlmClient>, model: ModelConfig, lookups: Arc<LookupSet>) -> Self {
        Self {
            client,
            model,
            lookups,
        }
    }

    async fn answer(&self, state: &SessionState, query: &str) -> aegis_core::Result<String> {
        let alert = &state.alert;

        // Customer profile enriches the prompt; a missing profile is not
        // an error for a conversation turn.
        let profile = self
            .lookups
            .lookup(names::KYC_PROFILE, &alert.subject_id, Value::Null)
            .await
            .ok()
            .and_then(|outcome| outcome.as_value().cloned());
        let profile_text = match &profile {
            Some(p) => format!(
                "- Name: {}\n- Occupation: {}\n- Income: ${}\n- Risk: {}",
                p["name"].as_str().unwrap_or("Unknown"),
                p["occupation"].as_str().unwrap_or("Unknown"),
                p["declared_income"].as_u64().unwrap_or(0),
                p["risk_rating"].as_str().unwrap_or("Unknown"),
            ),
            None => "- No profile on file".to_string(),
        };

        let history = if state.conversation_turns.is_empty() {
            "(No previous messages)".to_string()
        } else {
            state
                .conversation_turns
                .iter()
                .rev()
                .take(HISTORY_WINDOW)
                .rev()
                .map(|turn| {
                    let role = match turn.role {
                        TurnRole::User => "User",
                        TurnRole::Assistant => "Assistant",
                    };
                    format!("{role}: {}", turn.content)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user_prompt = format!(
            "ALERT CONTEXT:\n- Alert ID: {}\n- Scenario: {} ({})\n- Customer: {}\n\
             - Details: {}\n\nCUSTOMER:\n{}\n\nHISTORY:\n{}\n\nUSER: {}\n\nRespond helpfully.",
            alert.alert_id,
            alert.scenario_name,
            alert.scenario.code(),
            alert.subject_id,
            alert.trigger_details,
            profile_text,
            history,
            query,
        );

        self.client
            .complete(&self.model, SYSTEM_PROMPT, &user_prompt)
            .await
    }
}

impl AgentStep for Conversational {
    fn node(&self) -> WorkflowNode {
        WorkflowNode::Conversational
    }

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate> {
        let state = state.clone();
        Box::pin(async move {
            let query = state.user_query.clone().unwrap_or_default();
            debug!(alert = %state.alert.alert_id, "Conversational step");

            let response = match self.answer(&state, &query).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Conversational agent failed");
                    format!("Error: {e}. Please try again.")
                }
            };

            StateUpdate::default()
                .with_turn(ConversationTurn::user(&query))
                .with_turn(ConversationTurn::assistant(&response))
                .with_response(response)
                .with_directive(WorkflowNode::Terminal, "conversation turn complete")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::types::{ScenarioCode, SessionId};
    use aegis_lookup::FixtureDataset;
    use aegis_test_utils::{demo_alert, test_model_config, ScriptedLlm};

    fn agent(llm: Arc<ScriptedLlm>) -> Conversational {
        Conversational::new(
            llm as Arc<dyn LlmClient>,
            test_model_config(),
            Arc::new(LookupSet::with_fixtures(Arc::new(FixtureDataset::seeded()))),
        )
    }

    fn conversation_state(query: &str) -> SessionState {
        SessionState::new_conversation(
            SessionId::new(),
            demo_alert(ScenarioCode::Structuring),
            query,
        )
    }

    #[tokio::test]
    async fn writes_response_turns_and_terminal_directive() {
        let llm = Arc::new(
            ScriptedLlm::new().respond("Three deposits just under the reporting threshold."),
        );
        let state = conversation_state("why was this alert raised?");

        let update = agent(llm.clone()).step(&state).await;
        let merged = state.apply(update);

        assert_eq!(
            merged.conversation_response.as_deref(),
            Some("Three deposits just under the reporting threshold.")
        );
        assert_eq!(merged.conversation_turns.len(), 2);
        assert_eq!(merged.conversation_turns[0].role, TurnRole::User);
        assert_eq!(merged.conversation_turns[1].role, TurnRole::Assistant);
        assert_eq!(
            merged.directive.as_ref().unwrap().next,
            WorkflowNode::Terminal
        );

        // The customer profile made it into the prompt.
        let prompts = llm.seen_prompts();
        assert!(prompts[0].contains("Jeweler"));
        assert!(prompts[0].contains("why was this alert raised?"));
    }

    #[tokio::test]
    async fn failure_still_ends_the_turn() {
        let llm = Arc::new(ScriptedLlm::new().fail("model down"));
        let state = conversation_state("hello?");

        let update = agent(llm).step(&state).await;
        let merged = state.apply(update);

        assert!(merged
            .conversation_response
            .as_deref()
            .unwrap()
            .starts_with("Error:"));
        assert_eq!(merged.conversation_turns.len(), 2);
        assert_eq!(
            merged.directive.as_ref().unwrap().next,
            WorkflowNode::Terminal
        );
    }

    #[tokio::test]
    async fn history_is_replayed_into_the_prompt() {
        let llm = Arc::new(ScriptedLlm::new().respond("As noted, the pattern repeats."));
        let state = conversation_state("and the second deposit?").apply(
            StateUpdate::default()
                .with_turn(ConversationTurn::user("what about the first deposit?"))
                .with_turn(ConversationTurn::assistant("It was $9,200 at Branch A.")),
        );

        let _ = agent(llm.clone()).step(&state).await;
        let prompts = llm.seen_prompts();
        assert!(prompts[0].contains("It was $9,200 at Branch A."));
    }
}
