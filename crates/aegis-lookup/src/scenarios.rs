use aegis_core::types::{AlertContext, ScenarioCode};

/// The five authoritative demo alerts, one per typology, matched to the
/// seeded fixture subjects.
pub fn all() -> Vec<AlertContext> {
    vec![
        AlertContext::new(
            "A-001",
            ScenarioCode::VelocitySpike,
            "CUST-101",
            "5+ transactions over $5k within 48 hours",
        ),
        AlertContext::new(
            "A-002",
            ScenarioCode::Structuring,
            "CUST-102",
            "3 cash deposits in 7 days, each between $9k and $9.9k",
        ),
        AlertContext::new(
            "A-003",
            ScenarioCode::KycInconsistency,
            "CUST-103",
            "Outbound wire of $20k to Precious Metals Trading",
        ),
        AlertContext::new(
            "A-004",
            ScenarioCode::SanctionsHit,
            "CUST-104",
            "Counterparty 'Deepak' fuzzy name match against consolidated watchlists",
        ),
        AlertContext::new(
            "A-005",
            ScenarioCode::DormantReactivation,
            "CUST-105",
            "Dormant 12+ months, $15k wire-in followed by immediate ATM withdrawal",
        ),
    ]
}

/// The demo alert for one typology.
pub fn by_code(code: ScenarioCode) -> AlertContext {
    all()
        .into_iter()
        .find(|a| a.scenario == code)
        .unwrap_or_else(|| unreachable!("catalog covers every scenario"))
}

/// Find a demo alert by its alert id ("A-001".."A-005").
pub fn by_alert_id(alert_id: &str) -> Option<AlertContext> {
    all().into_iter().find(|a| a.alert_id == alert_id)
}
