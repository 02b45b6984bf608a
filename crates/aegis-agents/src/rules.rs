//! Deterministic adjudication: fact extraction from findings plus the
//! ordered rule table, one guarded-clause family per alert typology.

use std::collections::HashMap;

use futures::future::BoxFuture;

use aegis_core::error::Result;
use aegis_core::traits::{DecisionOutput, DecisionStrategy};
use aegis_core::types::{AlertContext, Finding, Resolution, ResolutionAction, ScenarioCode};

/// Aggregate linked-account deposits above this over 7 days indicate
/// structuring.
pub const STRUCTURING_AGGREGATE_THRESHOLD: f64 = 28_000.0;

/// Watchlist confidence above this, with a category, is a confirmed match.
pub const SANCTIONS_CONFIDENCE_THRESHOLD: f64 = 0.90;

/// Single-transaction amount treated as high-value in velocity analysis.
pub const HIGH_VALUE_TXN_THRESHOLD: f64 = 5_000.0;

/// Currency-transaction reporting threshold; deposits just below it are
/// the structuring signature.
pub const CTR_REPORTING_THRESHOLD: f64 = 10_000.0;

/// Jurisdictions whose watchlist hits always go to human review.
pub const HIGH_RISK_JURISDICTIONS: &[&str] = &["high-risk", "iran", "north korea", "russia", "syria"];

/// Counterparty sector value for precious-metals trading.
pub const SECTOR_PRECIOUS_METALS: &str = "precious_metals";

/// Fact keys the gathering agents emit and the rule table reads back.
pub mod facts {
    pub const HISTORICAL_MAX_TXN: &str = "historical_max_txn";
    pub const HISTORICAL_AVG_TXN: &str = "historical_avg_txn";
    pub const HIGH_VALUE_COUNT_90D: &str = "high_value_count_90d";
    pub const TOTAL_TRANSACTIONS: &str = "total_transactions";
    pub const AGGREGATE_RECENT_DEPOSITS: &str = "aggregate_recent_deposits";
    pub const SUB_THRESHOLD_DEPOSITS: &str = "sub_threshold_deposits";
    pub const IS_DORMANT: &str = "is_dormant";
    pub const DORMANT_MONTHS: &str = "dormant_months";
    pub const DECLARED_INCOME: &str = "declared_income";
    pub const OCCUPATION: &str = "occupation";
    pub const RISK_RATING: &str = "risk_rating";
    pub const KYC_VERIFIED: &str = "kyc_verified";
    pub const ADVERSE_MEDIA_HITS: &str = "adverse_media_hits";
    pub const WATCHLIST_CONFIDENCE: &str = "watchlist_confidence";
    pub const WATCHLIST_CONFIRMED: &str = "watchlist_confirmed";
    pub const WATCHLIST_CATEGORY: &str = "watchlist_category";
    pub const WATCHLIST_ENTITY_MATCH: &str = "watchlist_entity_match";
    pub const WATCHLIST_JURISDICTION: &str = "watchlist_jurisdiction";
    pub const WATCHLIST_MATCH_TYPE: &str = "watchlist_match_type";
    pub const COUNTERPARTY: &str = "counterparty";
    pub const COUNTERPARTY_SECTOR: &str = "counterparty_sector";
    pub const INTERNATIONAL_CASHOUT: &str = "international_cashout";
}

/// Facts parsed out of the findings log. Gathering agents write findings
/// as `key: value` lines; anything that is not a well-formed fact line
/// (prose headers, error findings) is ignored. Later values win.
#[derive(Debug, Default)]
pub struct EvidenceSummary {
    entries: HashMap<String, String>,
}

impl EvidenceSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut entries = HashMap::new();
        for finding in findings.iter().filter(|f| !f.is_error()) {
            for line in finding.content.lines() {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() || value.is_empty() {
                    continue;
                }
                if !key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                {
                    continue;
                }
                entries.insert(key.to_string(), value.to_string());
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.text(key)?.replace(',', "").parse().ok()
    }

    pub fn count(&self, key: &str) -> u64 {
        self.number(key).unwrap_or(0.0) as u64
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.text(key), Some("true"))
    }
}

/// The canonical decision strategy: ordered guarded clauses per typology,
/// evaluated over the evidence summary. Requires no model.
pub struct RuleTable;

impl DecisionStrategy for RuleTable {
    fn decide(
        &self,
        alert: &AlertContext,
        findings: &[Finding],
    ) -> BoxFuture<'_, Result<DecisionOutput>> {
        let alert = alert.clone();
        let evidence = EvidenceSummary::from_findings(findings);
        Box::pin(async move {
            if evidence.is_empty() {
                return Ok(DecisionOutput::Unparsed(
                    "no machine-readable evidence on file".into(),
                ));
            }
            Ok(DecisionOutput::Resolved(adjudicate(&alert, &evidence)))
        })
    }
}

fn adjudicate(alert: &AlertContext, evidence: &EvidenceSummary) -> Resolution {
    match alert.scenario {
        ScenarioCode::VelocitySpike => velocity(evidence),
        ScenarioCode::Structuring => structuring(evidence),
        ScenarioCode::KycInconsistency => kyc_inconsistency(evidence),
        ScenarioCode::SanctionsHit => sanctions(evidence),
        ScenarioCode::DormantReactivation => dormancy(evidence),
    }
}

fn resolution(
    action: ResolutionAction,
    rule_id: &str,
    confidence: f64,
    rationale: String,
) -> Resolution {
    Resolution {
        action,
        rationale,
        confidence,
        rule_id: rule_id.to_string(),
    }
}

fn velocity(e: &EvidenceSummary) -> Resolution {
    let prior_high_value = e.count(facts::HIGH_VALUE_COUNT_90D);
    let income = e.number(facts::DECLARED_INCOME).unwrap_or(0.0);
    let monthly_income = income / 12.0;
    let income_mismatch = income > 0.0 && HIGH_VALUE_TXN_THRESHOLD > monthly_income;

    if prior_high_value == 0 && income_mismatch {
        resolution(
            ResolutionAction::EscalateSar,
            "A-001.1",
            0.9,
            format!(
                "No high-value activity in the trailing 90 days and the flagged amounts \
                 exceed declared monthly income (~${monthly_income:.0})."
            ),
        )
    } else if prior_high_value >= 3 {
        resolution(
            ResolutionAction::FalsePositive,
            "A-001.2",
            0.85,
            format!(
                "{prior_high_value} high-value transactions in the trailing 90 days; \
                 the spike matches the established business cycle."
            ),
        )
    } else {
        resolution(
            ResolutionAction::Rfi,
            "A-001.3",
            0.75,
            "Insufficient history to distinguish layering from a one-off; \
             requesting information from the customer."
                .into(),
        )
    }
}

fn structuring(e: &EvidenceSummary) -> Resolution {
    let aggregate = e.number(facts::AGGREGATE_RECENT_DEPOSITS).unwrap_or(0.0);
    let sub_threshold = e.count(facts::SUB_THRESHOLD_DEPOSITS);

    if aggregate > STRUCTURING_AGGREGATE_THRESHOLD {
        resolution(
            ResolutionAction::EscalateSar,
            "A-002.1",
            0.92,
            format!(
                "Linked accounts aggregate ${aggregate:.0} in deposits over the trailing \
                 7 days, above the ${STRUCTURING_AGGREGATE_THRESHOLD:.0} structuring threshold."
            ),
        )
    } else if sub_threshold >= 3 {
        resolution(
            ResolutionAction::Rfi,
            "A-002.2",
            0.8,
            format!(
                "{sub_threshold} deposits just under the ${CTR_REPORTING_THRESHOLD:.0} \
                 reporting threshold but aggregate within bounds; requesting \
                 source-of-funds documentation."
            ),
        )
    } else {
        resolution(
            ResolutionAction::FalsePositive,
            "A-002.3",
            0.75,
            "No sub-threshold deposit pattern and linked-account aggregate within bounds.".into(),
        )
    }
}

fn kyc_inconsistency(e: &EvidenceSummary) -> Resolution {
    let occupation = e
        .text(facts::OCCUPATION)
        .unwrap_or("")
        .to_ascii_lowercase();
    let income = e.number(facts::DECLARED_INCOME).unwrap_or(0.0);
    let max_txn = e.number(facts::HISTORICAL_MAX_TXN).unwrap_or(0.0);
    let media_hits = e.count(facts::ADVERSE_MEDIA_HITS);
    let metals_counterparty =
        e.text(facts::COUNTERPARTY_SECTOR) == Some(SECTOR_PRECIOUS_METALS);

    let metals_adjacent = occupation.contains("jeweler")
        || occupation.contains("trader")
        || occupation.contains("precious metals");
    let low_income_typical =
        occupation.contains("teacher") || occupation.contains("student");

    if metals_adjacent && metals_counterparty {
        resolution(
            ResolutionAction::FalsePositive,
            "A-003.1",
            0.85,
            format!(
                "Occupation ({occupation}) is consistent with the precious-metals \
                 counterparty sector."
            ),
        )
    } else if low_income_typical && metals_counterparty {
        resolution(
            ResolutionAction::EscalateSar,
            "A-003.2",
            0.9,
            format!(
                "Occupation ({occupation}) cannot plausibly source large wires to \
                 precious-metals trading."
            ),
        )
    } else if (income > 0.0 && max_txn > income / 12.0) || media_hits > 0 {
        resolution(
            ResolutionAction::Rfi,
            "A-003.3",
            0.78,
            format!(
                "Activity above declared monthly means (max ${max_txn:.0}) or open \
                 adverse-media items ({media_hits}); requesting clarification."
            ),
        )
    } else {
        resolution(
            ResolutionAction::FalsePositive,
            "A-003.4",
            0.8,
            "Profile and transaction activity are mutually consistent.".into(),
        )
    }
}

fn sanctions(e: &EvidenceSummary) -> Resolution {
    let confidence = e.number(facts::WATCHLIST_CONFIDENCE).unwrap_or(0.0);
    let confirmed = e.flag(facts::WATCHLIST_CONFIRMED);
    let counterparty = e.text(facts::COUNTERPARTY).unwrap_or("counterparty");
    let entity_match = e.flag(facts::WATCHLIST_ENTITY_MATCH);
    let jurisdiction = e
        .text(facts::WATCHLIST_JURISDICTION)
        .unwrap_or("")
        .to_ascii_lowercase();
    let high_risk_jurisdiction = HIGH_RISK_JURISDICTIONS.contains(&jurisdiction.as_str());

    if confirmed && confidence > SANCTIONS_CONFIDENCE_THRESHOLD {
        resolution(
            ResolutionAction::BlockAccount,
            "A-004.1",
            0.99,
            format!(
                "Confirmed watchlist match for {counterparty} at {confidence:.2} \
                 confidence; immediate block required."
            ),
        )
    } else if entity_match || high_risk_jurisdiction {
        let signal = if entity_match {
            "list entity identifier matched".to_string()
        } else {
            format!("counterparty jurisdiction ({jurisdiction}) is high-risk")
        };
        resolution(
            ResolutionAction::EscalateSar,
            "A-004.2",
            0.85,
            format!(
                "Watchlist screening for {counterparty}: {signal} at {confidence:.2} \
                 confidence; human review required."
            ),
        )
    } else {
        resolution(
            ResolutionAction::FalsePositive,
            "A-004.3",
            0.9,
            format!(
                "Watchlist screening for {counterparty} returned {confidence:.2} \
                 confidence; common-name false positive."
            ),
        )
    }
}

fn dormancy(e: &EvidenceSummary) -> Resolution {
    let dormant = e.flag(facts::IS_DORMANT);
    let months = e.count(facts::DORMANT_MONTHS);
    let risk = e
        .text(facts::RISK_RATING)
        .unwrap_or("")
        .to_ascii_lowercase();
    let verified = e.text(facts::KYC_VERIFIED).map_or(true, |v| v == "true");
    let international = e.flag(facts::INTERNATIONAL_CASHOUT);

    if dormant && (risk == "high" || !verified || international) {
        resolution(
            ResolutionAction::EscalateSar,
            "A-005.1",
            0.88,
            format!(
                "Account dormant {months} months reactivated by a high-risk or \
                 KYC-unverified customer, or with an international cash-out."
            ),
        )
    } else if dormant {
        resolution(
            ResolutionAction::Rfi,
            "A-005.2",
            0.85,
            format!(
                "Account dormant {months} months; requesting confirmation of the \
                 reactivating activity from the customer."
            ),
        )
    } else {
        resolution(
            ResolutionAction::FalsePositive,
            "A-005.3",
            0.8,
            "Account shows continuous activity; dormancy trigger not substantiated.".into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::types::AgentName;
    use aegis_test_utils::demo_alert;

    fn investigator(content: &str) -> Finding {
        Finding::new(AgentName::Investigator, content)
    }

    fn gatherer(content: &str) -> Finding {
        Finding::new(AgentName::ContextGatherer, content)
    }

    async fn decide(scenario: ScenarioCode, findings: Vec<Finding>) -> Resolution {
        match RuleTable
            .decide(&demo_alert(scenario), &findings)
            .await
            .unwrap()
        {
            DecisionOutput::Resolved(r) => r,
            DecisionOutput::Unparsed(raw) => panic!("expected a resolution, got: {raw}"),
        }
    }

    #[test]
    fn summary_ignores_prose_and_error_findings() {
        let findings = vec![
            investigator("Transaction analysis for CUST-101\nhistorical_max_txn: 1500\ntotal_transactions: 4"),
            Finding::error(AgentName::ContextGatherer, "lookup exploded: twice"),
        ];
        let e = EvidenceSummary::from_findings(&findings);
        assert_eq!(e.number(facts::HISTORICAL_MAX_TXN), Some(1500.0));
        assert_eq!(e.count(facts::TOTAL_TRANSACTIONS), 4);
        assert!(e.text("lookup exploded").is_none());
    }

    #[test]
    fn later_facts_win() {
        let findings = vec![
            investigator("high_value_count_90d: 1"),
            investigator("high_value_count_90d: 4"),
        ];
        let e = EvidenceSummary::from_findings(&findings);
        assert_eq!(e.count(facts::HIGH_VALUE_COUNT_90D), 4);
    }

    #[tokio::test]
    async fn velocity_spike_without_history_escalates() {
        let r = decide(
            ScenarioCode::VelocitySpike,
            vec![
                investigator("high_value_count_90d: 0\nhistorical_max_txn: 1500"),
                gatherer("declared_income: 50000\noccupation: Teacher"),
            ],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-001.1");
    }

    #[tokio::test]
    async fn velocity_spike_matching_business_cycle_closes() {
        let r = decide(
            ScenarioCode::VelocitySpike,
            vec![
                investigator("high_value_count_90d: 5"),
                gatherer("declared_income: 500000"),
            ],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::FalsePositive);
        assert_eq!(r.rule_id, "A-001.2");
    }

    #[tokio::test]
    async fn structuring_above_aggregate_threshold_escalates() {
        let r = decide(
            ScenarioCode::Structuring,
            vec![investigator(
                "aggregate_recent_deposits: 28500\nsub_threshold_deposits: 3",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-002.1");
        assert!(r.rationale.contains("28500"));
    }

    #[tokio::test]
    async fn structuring_pattern_without_aggregate_requests_information() {
        let r = decide(
            ScenarioCode::Structuring,
            vec![investigator(
                "aggregate_recent_deposits: 12000\nsub_threshold_deposits: 3",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::Rfi);
        assert_eq!(r.rule_id, "A-002.2");
    }

    #[tokio::test]
    async fn jeweler_wiring_to_metals_is_false_positive() {
        let r = decide(
            ScenarioCode::KycInconsistency,
            vec![gatherer(
                "occupation: Jeweler\ndeclared_income: 120000\ncounterparty_sector: precious_metals",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::FalsePositive);
        assert_eq!(r.rule_id, "A-003.1");
    }

    #[tokio::test]
    async fn teacher_wiring_to_metals_escalates() {
        let r = decide(
            ScenarioCode::KycInconsistency,
            vec![gatherer(
                "occupation: Teacher\ndeclared_income: 50000\ncounterparty_sector: precious_metals",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-003.2");
    }

    #[tokio::test]
    async fn jeweler_without_metals_counterparty_is_not_auto_closed() {
        // The occupation branch needs the counterparty in the same sector;
        // without it the family falls through to the consistency check.
        let r = decide(
            ScenarioCode::KycInconsistency,
            vec![gatherer("occupation: Jeweler\ndeclared_income: 120000")],
        )
        .await;
        assert_eq!(r.rule_id, "A-003.4");
    }

    #[tokio::test]
    async fn confirmed_watchlist_match_blocks() {
        let r = decide(
            ScenarioCode::SanctionsHit,
            vec![gatherer(
                "counterparty: Mahmoud Al-Hassan\nwatchlist_confidence: 0.98\nwatchlist_confirmed: true\nwatchlist_category: TERRORISM",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::BlockAccount);
        assert_eq!(r.rule_id, "A-004.1");
        assert_eq!(r.confidence, 0.99);
    }

    #[tokio::test]
    async fn common_name_hit_is_false_positive() {
        let r = decide(
            ScenarioCode::SanctionsHit,
            vec![gatherer(
                "counterparty: Deepak\nwatchlist_confidence: 0.15\nwatchlist_confirmed: false\n\
                 watchlist_entity_match: false\nwatchlist_jurisdiction: N/A",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::FalsePositive);
        assert_eq!(r.rule_id, "A-004.3");
    }

    #[tokio::test]
    async fn entity_identifier_match_escalates() {
        let r = decide(
            ScenarioCode::SanctionsHit,
            vec![gatherer(
                "counterparty: V. Petrov\nwatchlist_confidence: 0.60\nwatchlist_confirmed: false\n\
                 watchlist_entity_match: true\nwatchlist_jurisdiction: N/A",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-004.2");
    }

    #[tokio::test]
    async fn high_risk_jurisdiction_escalates() {
        let r = decide(
            ScenarioCode::SanctionsHit,
            vec![gatherer(
                "counterparty: Omar K\nwatchlist_confidence: 0.45\nwatchlist_confirmed: false\n\
                 watchlist_entity_match: false\nwatchlist_jurisdiction: Syria",
            )],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-004.2");
        assert!(r.rationale.contains("syria"));
    }

    #[tokio::test]
    async fn dormant_high_risk_reactivation_escalates() {
        let r = decide(
            ScenarioCode::DormantReactivation,
            vec![
                investigator("is_dormant: true\ndormant_months: 16"),
                gatherer("risk_rating: High\nkyc_verified: false"),
            ],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-005.1");
    }

    #[tokio::test]
    async fn dormant_low_risk_reactivation_requests_information() {
        let r = decide(
            ScenarioCode::DormantReactivation,
            vec![
                investigator("is_dormant: true\ndormant_months: 13\ninternational_cashout: false"),
                gatherer("risk_rating: Low\nkyc_verified: true"),
            ],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::Rfi);
        assert_eq!(r.rule_id, "A-005.2");
    }

    #[tokio::test]
    async fn dormant_international_cashout_escalates_despite_low_risk() {
        let r = decide(
            ScenarioCode::DormantReactivation,
            vec![
                investigator("is_dormant: true\ndormant_months: 13\ninternational_cashout: true"),
                gatherer("risk_rating: Low\nkyc_verified: true"),
            ],
        )
        .await;
        assert_eq!(r.action, ResolutionAction::EscalateSar);
        assert_eq!(r.rule_id, "A-005.1");
    }

    #[tokio::test]
    async fn empty_evidence_is_unparsed() {
        let output = RuleTable
            .decide(&demo_alert(ScenarioCode::VelocitySpike), &[])
            .await
            .unwrap();
        assert!(matches!(output, DecisionOutput::Unparsed(_)));
    }
}
