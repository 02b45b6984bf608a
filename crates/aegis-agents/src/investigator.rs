//! Investigator agent: queries the transaction side of the evidence —
//! history and velocity aggregates, linked-account aggregation for
//! structuring alerts, dormancy status for reactivation alerts.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use aegis_core::error::Result;
use aegis_core::state::{SessionState, StateUpdate};
use aegis_core::traits::AgentStep;
use aegis_core::types::{AgentName, Finding, ScenarioCode, WorkflowNode};
use aegis_lookup::{names, LookupSet};

use crate::rules::{facts, CTR_REPORTING_THRESHOLD};

/// Lower edge of the near-threshold deposit band.
const SUB_THRESHOLD_FLOOR: f64 = 9_000.0;

pub struct Investigator {
    lookups: Arc<LookupSet>,
}

impl Investigator {
    pub fn new(lookups: Arc<LookupSet>) -> Self {
        Self { lookups }
    }

    async fn gather(&self, state: &SessionState) -> Result<String> {
        let subject = state.alert.subject_id.as_str();
        let mut lines = vec![format!("Transaction analysis for {subject}")];

        let history = self
            .lookups
            .lookup(names::TRANSACTION_HISTORY, subject, Value::Null)
            .await?;

        match history.as_value() {
            Some(h) => {
                lines.push(fact(facts::HISTORICAL_MAX_TXN, num(h, "historical_max_txn")));
                lines.push(fact(facts::HISTORICAL_AVG_TXN, num(h, "historical_avg_txn")));
                lines.push(fact(
                    facts::HIGH_VALUE_COUNT_90D,
                    num(h, "high_value_count_90d"),
                ));
                lines.push(fact(
                    facts::TOTAL_TRANSACTIONS,
                    num(h, "total_transactions"),
                ));

                if state.alert.scenario == ScenarioCode::Structuring {
                    lines.push(fact(
                        facts::SUB_THRESHOLD_DEPOSITS,
                        sub_threshold_deposits(h) as f64,
                    ));
                }
            }
            None => {
                lines.push("No transaction history on file".into());
                lines.push(fact(facts::TOTAL_TRANSACTIONS, 0.0));
            }
        }

        if state.alert.scenario == ScenarioCode::Structuring {
            let linked = self
                .lookups
                .lookup(names::LINKED_ACCOUNTS, subject, Value::Null)
                .await?;
            if let Some(l) = linked.as_value() {
                lines.push(fact(
                    facts::AGGREGATE_RECENT_DEPOSITS,
                    num(l, "aggregate_recent_deposits"),
                ));
            }
        }

        if state.alert.scenario == ScenarioCode::DormantReactivation {
            let dormancy = self
                .lookups
                .lookup(names::DORMANCY_CHECK, subject, Value::Null)
                .await?;
            if let Some(d) = dormancy.as_value() {
                lines.push(format!(
                    "{}: {}",
                    facts::IS_DORMANT,
                    d["is_dormant"].as_bool().unwrap_or(false)
                ));
                lines.push(fact(facts::DORMANT_MONTHS, num(d, "dormant_months")));
                lines.push(format!(
                    "{}: {}",
                    facts::INTERNATIONAL_CASHOUT,
                    international_cashout(&state.alert.trigger_details, d)
                ));
                if let Some(date) = d["last_activity_date"].as_str() {
                    lines.push(format!("Last activity on {date}"));
                }
            }
        }

        Ok(lines.join("\n"))
    }
}

impl AgentStep for Investigator {
    fn node(&self) -> WorkflowNode {
        WorkflowNode::Investigator
    }

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate> {
        let state = state.clone();
        Box::pin(async move {
            debug!(subject = %state.alert.subject_id, "Investigator step");
            match self.gather(&state).await {
                Ok(report) => StateUpdate::default()
                    .with_finding(Finding::new(AgentName::Investigator, report))
                    .with_directive(WorkflowNode::Router, "transaction analysis complete"),
                Err(e) => {
                    warn!(error = %e, "Investigator step failed");
                    StateUpdate::default()
                        .with_finding(Finding::error(AgentName::Investigator, &e))
                        .with_directive(
                            WorkflowNode::Investigator,
                            "transaction analysis failed, retrying",
                        )
                }
            }
        })
    }
}

fn num(value: &Value, key: &str) -> f64 {
    value[key].as_f64().unwrap_or(0.0)
}

/// Render a numeric fact line, dropping the fraction when it is whole.
fn fact(key: &str, value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{key}: {}", value as i64)
    } else {
        format!("{key}: {value:.2}")
    }
}

/// International cash-out signal: the trigger or a recent debit names
/// international or overseas movement.
fn international_cashout(trigger: &str, dormancy: &Value) -> bool {
    let names_international =
        |text: &str| text.contains("international") || text.contains("overseas");
    if names_international(&trigger.to_ascii_lowercase()) {
        return true;
    }
    dormancy["recent_transactions"]
        .as_array()
        .map(|rows| {
            rows.iter().any(|t| {
                t["type"].as_str() == Some("debit")
                    && names_international(
                        &t["description"].as_str().unwrap_or("").to_ascii_lowercase(),
                    )
            })
        })
        .unwrap_or(false)
}

/// Count credits sitting just under the reporting threshold.
fn sub_threshold_deposits(history: &Value) -> usize {
    history["transactions"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter(|t| {
                    let amount = t["amount"].as_f64().unwrap_or(0.0);
                    t["type"].as_str() == Some("credit")
                        && amount >= SUB_THRESHOLD_FLOOR
                        && amount < CTR_REPORTING_THRESHOLD
                })
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::types::{RunMode, SessionId};
    use aegis_lookup::FixtureDataset;
    use aegis_test_utils::{demo_alert, FailingLookup};

    fn state_for(code: ScenarioCode) -> SessionState {
        SessionState::new_resolve(SessionId::new(), demo_alert(code))
    }

    fn fixture_lookups() -> Arc<LookupSet> {
        Arc::new(LookupSet::with_fixtures(Arc::new(FixtureDataset::seeded())))
    }

    #[tokio::test]
    async fn emits_velocity_facts_and_returns_to_router() {
        let agent = Investigator::new(fixture_lookups());
        let state = state_for(ScenarioCode::VelocitySpike);

        let update = agent.step(&state).await;
        let merged = state.apply(update);

        assert!(merged.has_findings_from(AgentName::Investigator));
        let content = &merged.findings[0].content;
        assert!(content.contains("high_value_count_90d: 0"));
        assert!(content.contains("historical_max_txn: 1500"));
        assert_eq!(
            merged.directive.as_ref().unwrap().next,
            WorkflowNode::Router
        );
        assert_eq!(merged.mode, RunMode::Resolve);
    }

    #[tokio::test]
    async fn structuring_alert_includes_linked_aggregate() {
        let agent = Investigator::new(fixture_lookups());
        let state = state_for(ScenarioCode::Structuring);

        let update = agent.step(&state).await;
        let content = &update.findings[0].content;
        assert!(content.contains("aggregate_recent_deposits: 28500"));
        assert!(content.contains("sub_threshold_deposits: 3"));
    }

    #[tokio::test]
    async fn dormancy_alert_includes_dormancy_facts() {
        let agent = Investigator::new(fixture_lookups());
        let state = state_for(ScenarioCode::DormantReactivation);

        let update = agent.step(&state).await;
        let content = &update.findings[0].content;
        assert!(content.contains("is_dormant: true"));
        assert!(content.contains("dormant_months: 16"));
        // CUST-105's wire-in plus domestic ATM withdrawal is not one.
        assert!(content.contains("international_cashout: false"));
    }

    #[tokio::test]
    async fn international_trigger_sets_the_cashout_flag() {
        let agent = Investigator::new(fixture_lookups());
        let alert = aegis_core::types::AlertContext::new(
            "A-900",
            ScenarioCode::DormantReactivation,
            "CUST-105",
            "Dormant 16 months, $15k wire-in followed by international ATM withdrawal",
        );
        let state = SessionState::new_resolve(SessionId::new(), alert);

        let update = agent.step(&state).await;
        assert!(update.findings[0]
            .content
            .contains("international_cashout: true"));
    }

    #[tokio::test]
    async fn lookup_failure_becomes_error_finding_and_self_retry() {
        let mut set = LookupSet::new();
        set.register(FailingLookup::new(names::TRANSACTION_HISTORY));
        let agent = Investigator::new(Arc::new(set));
        let state = state_for(ScenarioCode::VelocitySpike);

        let update = agent.step(&state).await;
        assert!(update.findings[0].is_error());
        let merged = state.apply(update);
        assert!(!merged.has_findings_from(AgentName::Investigator));
        assert_eq!(
            merged.directive.as_ref().unwrap().next,
            WorkflowNode::Investigator
        );
    }
}
