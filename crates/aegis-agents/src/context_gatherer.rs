//! Context Gatherer agent: KYC profile, adverse media, and watchlist
//! screening of any counterparty named in the alert trigger.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, warn};

use aegis_core::error::Result;
use aegis_core::state::{SessionState, StateUpdate};
use aegis_core::traits::AgentStep;
use aegis_core::types::{AgentName, Finding, WorkflowNode};
use aegis_lookup::{names, LookupSet};

use crate::rules::{facts, SANCTIONS_CONFIDENCE_THRESHOLD, SECTOR_PRECIOUS_METALS};

pub struct ContextGatherer {
    lookups: Arc<LookupSet>,
}

impl ContextGatherer {
    pub fn new(lookups: Arc<LookupSet>) -> Self {
        Self { lookups }
    }

    async fn gather(&self, state: &SessionState) -> Result<String> {
        let subject = state.alert.subject_id.as_str();
        let mut lines = vec![format!("Customer context for {subject}")];

        let kyc = self
            .lookups
            .lookup(names::KYC_PROFILE, subject, Value::Null)
            .await?;
        match kyc.as_value() {
            Some(p) => {
                if let Some(income) = p["declared_income"].as_f64() {
                    lines.push(format!("{}: {}", facts::DECLARED_INCOME, income as i64));
                }
                if let Some(occupation) = p["occupation"].as_str() {
                    lines.push(format!("{}: {occupation}", facts::OCCUPATION));
                }
                if let Some(risk) = p["risk_rating"].as_str() {
                    lines.push(format!("{}: {risk}", facts::RISK_RATING));
                }
                lines.push(format!(
                    "{}: {}",
                    facts::KYC_VERIFIED,
                    p["kyc_verified"].as_bool().unwrap_or(false)
                ));
            }
            None => lines.push("No KYC profile on file".into()),
        }

        let media = self
            .lookups
            .lookup(names::ADVERSE_MEDIA, subject, Value::Null)
            .await?;
        if let Some(m) = media.as_value() {
            lines.push(format!(
                "{}: {}",
                facts::ADVERSE_MEDIA_HITS,
                m["hits"].as_u64().unwrap_or(0)
            ));
            if let Some(summary) = m["summary"].as_str() {
                lines.push(summary.to_string());
            }
        }

        if let Some(sector) = counterparty_sector(&state.alert.trigger_details) {
            lines.push(format!("{}: {sector}", facts::COUNTERPARTY_SECTOR));
        }

        if let Some(counterparty) = quoted_name(&state.alert.trigger_details) {
            let screening = self
                .lookups
                .lookup(
                    names::WATCHLIST_LOOKUP,
                    subject,
                    json!({ "counterparty_name": counterparty }),
                )
                .await?;
            if let Some(w) = screening.as_value() {
                let confidence = w["confidence"].as_f64().unwrap_or(0.0);
                let confirmed =
                    w["category"].is_string() && confidence > SANCTIONS_CONFIDENCE_THRESHOLD;

                lines.push(format!("{}: {counterparty}", facts::COUNTERPARTY));
                lines.push(format!("{}: {confidence}", facts::WATCHLIST_CONFIDENCE));
                lines.push(format!("{}: {confirmed}", facts::WATCHLIST_CONFIRMED));
                lines.push(format!(
                    "{}: {}",
                    facts::WATCHLIST_ENTITY_MATCH,
                    w["entity_id"].is_string()
                ));
                if let Some(category) = w["category"].as_str() {
                    lines.push(format!("{}: {category}", facts::WATCHLIST_CATEGORY));
                }
                if let Some(jurisdiction) = w["jurisdiction"].as_str() {
                    lines.push(format!("{}: {jurisdiction}", facts::WATCHLIST_JURISDICTION));
                }
                if let Some(match_type) = w["match_type"].as_str() {
                    lines.push(format!("{}: {match_type}", facts::WATCHLIST_MATCH_TYPE));
                }
            }
        }

        Ok(lines.join("\n"))
    }
}

impl AgentStep for ContextGatherer {
    fn node(&self) -> WorkflowNode {
        WorkflowNode::ContextGatherer
    }

    fn step(&self, state: &SessionState) -> BoxFuture<'_, StateUpdate> {
        let state = state.clone();
        Box::pin(async move {
            debug!(subject = %state.alert.subject_id, "Context Gatherer step");
            match self.gather(&state).await {
                Ok(report) => StateUpdate::default()
                    .with_finding(Finding::new(AgentName::ContextGatherer, report))
                    .with_directive(WorkflowNode::Router, "customer context gathered"),
                Err(e) => {
                    warn!(error = %e, "Context Gatherer step failed");
                    StateUpdate::default()
                        .with_finding(Finding::error(AgentName::ContextGatherer, &e))
                        .with_directive(
                            WorkflowNode::ContextGatherer,
                            "context gathering failed, retrying",
                        )
                }
            }
        })
    }
}

/// Sector classification of the counterparty named in the trigger. The
/// adjudication rules only distinguish the precious-metals sector today.
fn counterparty_sector(details: &str) -> Option<&'static str> {
    let lowered = details.to_ascii_lowercase();
    ["precious metals", "bullion", "gold trading"]
        .iter()
        .any(|kw| lowered.contains(kw))
        .then_some(SECTOR_PRECIOUS_METALS)
}

/// Extract the first quoted name from the trigger details. Alert feeds
/// quote counterparty names; subjects are never quoted.
fn quoted_name(details: &str) -> Option<&str> {
    for quote in ['\'', '"'] {
        let mut parts = details.splitn(3, quote);
        let _ = parts.next();
        if let (Some(inner), Some(_)) = (parts.next(), parts.next()) {
            let inner = inner.trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }
    None
}
