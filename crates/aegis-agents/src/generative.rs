//! Generative decision strategy: prompts the model with the standing
//! operating procedures and the gathered evidence, expecting a single
//! JSON resolution object back.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use aegis_core::config::ModelConfig;
use aegis_core::error::Result;
use aegis_core::traits::{DecisionOutput, DecisionStrategy, LlmClient};
use aegis_core::types::{AlertContext, Finding, Resolution, ResolutionAction};
use aegis_llm::extract_json_object;

const SYSTEM_PROMPT: &str = "\
You are the Aegis Adjudicator.

Your role: make the final resolution decision based on standing operating \
procedures and the gathered evidence.

SOP RULES:

A-001 Velocity Spike (Layering):
- IF no prior high velocity in 90 days AND income mismatch -> ESCALATE_SAR
- IF velocity spike matches known business cycle -> FALSE_POSITIVE

A-002 Below-Threshold Structuring:
- IF linked accounts aggregate more than $28,000 in 7 days -> ESCALATE_SAR
- IF deposits geographically diverse AND legitimate business -> RFI

A-003 KYC Inconsistency:
- IF occupation is Jeweler/Trader AND transaction to Precious Metals -> FALSE_POSITIVE
- IF occupation is Teacher/Student AND large wire to Precious Metals -> ESCALATE_SAR

A-004 Sanctions List Hit:
- IF confirmed sanctions match (terrorist, OFAC list) -> BLOCK_ACCOUNT (immediate)
- IF true entity id match OR high-risk jurisdiction -> ESCALATE_SAR
- IF common name false positive -> FALSE_POSITIVE

A-005 Dormant Account Reactivation:
- IF KYC risk Low -> RFI
- IF KYC risk High OR international withdrawal -> ESCALATE_SAR

BLOCK_ACCOUNT: use ONLY for confirmed sanctions matches above 90% confidence.

Output ONLY a JSON resolution:
{
  \"action\": \"ESCALATE_SAR\" | \"RFI\" | \"FALSE_POSITIVE\" | \"BLOCK_ACCOUNT\",
  \"rationale\": \"detailed explanation\",
  \"confidence\": 0.0-1.0,
  \"rule_id\": \"A-00X.Y\"
}";

pub struct GenerativeDecision {
    client: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl GenerativeDecision {
    pub fn new(client: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { client, model }
    }
}

/// Wire shape the model is asked for. `sop_rule_applied` is the spelling
/// older prompt revisions used.
#[derive(Deserialize)]
struct WireResolution {
    action: ResolutionAction,
    rationale: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default, alias = "sop_rule_applied")]
    rule_id: String,
}

fn default_confidence() -> f64 {
    0.7
}

impl DecisionStrategy for GenerativeDecision {
    fn decide(
        &self,
        alert: &AlertContext,
        findings: &[Finding],
    ) -> BoxFuture<'_, Result<DecisionOutput>> {
        let alert = alert.clone();
        let evidence = findings
            .iter()
            .map(|f| format!("[{}] {}", f.source, f.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        Box::pin(async move {
            let user_prompt = format!(
                "Alert ID: {}\nScenario: {} - {}\n\nALL GATHERED EVIDENCE:\n{}\n\n\
                 Based on the SOP rules for {}, make your final resolution decision. \
                 Output ONLY the JSON resolution format.",
                alert.alert_id,
                alert.scenario.code(),
                alert.scenario_name,
                evidence,
                alert.scenario.code(),
            );

            let text = self
                .client
                .complete(&self.model, SYSTEM_PROMPT, &user_prompt)
                .await?;

            let parsed = extract_json_object(&text)
                .and_then(|v| serde_json::from_value::<WireResolution>(v).ok());
            match parsed {
                Some(wire) => {
                    debug!(action = wire.action.as_str(), "Generative adjudication parsed");
                    Ok(DecisionOutput::Resolved(Resolution {
                        action: wire.action,
                        rationale: wire.rationale,
                        confidence: wire.confidence,
                        rule_id: if wire.rule_id.is_empty() {
                            alert.scenario.code().to_string()
                        } else {
                            wire.rule_id
                        },
                    }))
                }
                None => Ok(DecisionOutput::Unparsed(text)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::types::ScenarioCode;
    use aegis_test_utils::{demo_alert, test_model_config, ScriptedLlm};

    fn strategy(llm: ScriptedLlm) -> GenerativeDecision {
        GenerativeDecision::new(Arc::new(llm), test_model_config())
    }

    #[tokio::test]
    async fn parses_json_embedded_in_prose() {
        let llm = ScriptedLlm::new().respond(
            "Here is my decision:\n\
             {\"action\": \"ESCALATE_SAR\", \"rationale\": \"structuring pattern\", \
              \"confidence\": 0.92, \"sop_rule_applied\": \"A-002.1\"}",
        );
        let output = strategy(llm)
            .decide(&demo_alert(ScenarioCode::Structuring), &[])
            .await
            .unwrap();

        match output {
            DecisionOutput::Resolved(r) => {
                assert_eq!(r.action, ResolutionAction::EscalateSar);
                assert_eq!(r.rule_id, "A-002.1");
                assert_eq!(r.confidence, 0.92);
            }
            DecisionOutput::Unparsed(raw) => panic!("should have parsed: {raw}"),
        }
    }

    #[tokio::test]
    async fn non_json_output_is_unparsed() {
        let llm = ScriptedLlm::new().respond("I would probably escalate this one.");
        let output = strategy(llm)
            .decide(&demo_alert(ScenarioCode::Structuring), &[])
            .await
            .unwrap();
        assert!(matches!(output, DecisionOutput::Unparsed(_)));
    }

    #[tokio::test]
    async fn request_failure_propagates() {
        let llm = ScriptedLlm::new().fail("connection reset");
        let err = strategy(llm)
            .decide(&demo_alert(ScenarioCode::Structuring), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn findings_reach_the_prompt() {
        let llm = Arc::new(ScriptedLlm::new().respond("no json"));
        let strategy =
            GenerativeDecision::new(llm.clone() as Arc<dyn LlmClient>, test_model_config());
        let findings = vec![Finding::new(
            aegis_core::types::AgentName::Investigator,
            "aggregate_recent_deposits: 28500",
        )];
        let _ = strategy
            .decide(&demo_alert(ScenarioCode::Structuring), &findings)
            .await
            .unwrap();

        let prompts = llm.seen_prompts();
        assert!(prompts[0].contains("aggregate_recent_deposits: 28500"));
        assert!(prompts[0].contains("A-002"));
    }
}
