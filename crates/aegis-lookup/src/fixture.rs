use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A customer KYC profile row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub name: String,
    pub occupation: String,
    pub declared_income: u64,
    pub account_open_date: String,
    pub risk_rating: String,
    pub kyc_verified: bool,
    pub employer: String,
}

/// One historical transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRow {
    pub date: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// One watchlist entry for a counterparty name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub entity_id: Option<String>,
    pub jurisdiction: String,
    pub match_type: String,
    pub list_source: Option<String>,
    pub category: Option<String>,
    pub confidence: f64,
}

impl WatchlistEntry {
    /// A confirmed hit recommends an immediate block.
    pub fn is_confirmed(&self) -> bool {
        self.category.is_some() && self.confidence > 0.90
    }
}

/// Adverse-media search result for a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdverseMediaRecord {
    pub hits: u32,
    pub summary: String,
}

/// Seeded case data standing in for the transaction/customer query layer.
/// The relational backend is an external collaborator; this dataset carries
/// the same shapes at the interface boundary so runs are hermetic.
#[derive(Debug, Default)]
pub struct FixtureDataset {
    pub customers: HashMap<String, CustomerProfile>,
    pub transactions: HashMap<String, Vec<TransactionRow>>,
    pub watchlist: HashMap<String, WatchlistEntry>,
    pub adverse_media: HashMap<String, AdverseMediaRecord>,
    /// Aggregate deposits across linked accounts over the trailing 7 days.
    pub linked_aggregates: HashMap<String, f64>,
    /// Months dormant, for subjects flagged dormant.
    pub dormant_months: HashMap<String, u32>,
}

impl FixtureDataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The authoritative seeded dataset the demo scenarios run against.
    pub fn seeded() -> Self {
        let mut data = Self::default();

        data.add_customer(CustomerProfile {
            customer_id: "CUST-101".into(),
            name: "Rohitash".into(),
            occupation: "Teacher".into(),
            declared_income: 50_000,
            account_open_date: "2020-03-15".into(),
            risk_rating: "Low".into(),
            kyc_verified: true,
            employer: "Delhi Public School".into(),
        });
        data.add_customer(CustomerProfile {
            customer_id: "CUST-102".into(),
            name: "Priya".into(),
            occupation: "Jeweler".into(),
            declared_income: 120_000,
            account_open_date: "2018-06-20".into(),
            risk_rating: "Medium".into(),
            kyc_verified: true,
            employer: "Sharma Fine Jewelry Pvt Ltd".into(),
        });
        data.add_customer(CustomerProfile {
            customer_id: "CUST-103".into(),
            name: "Rajesh Traders Pvt Ltd".into(),
            occupation: "Construction Business".into(),
            declared_income: 500_000,
            account_open_date: "2019-01-10".into(),
            risk_rating: "Low".into(),
            kyc_verified: true,
            employer: "Self-Employed".into(),
        });
        data.add_customer(CustomerProfile {
            customer_id: "CUST-104".into(),
            name: "Anjali".into(),
            occupation: "Freelance Consultant".into(),
            declared_income: 75_000,
            account_open_date: "2021-05-12".into(),
            risk_rating: "Medium".into(),
            kyc_verified: true,
            employer: "Self-Employed".into(),
        });
        data.add_customer(CustomerProfile {
            customer_id: "CUST-105".into(),
            name: "Vikram".into(),
            occupation: "Retired".into(),
            declared_income: 30_000,
            account_open_date: "2015-08-05".into(),
            risk_rating: "High".into(),
            kyc_verified: false,
            employer: "N/A".into(),
        });

        data.transactions.insert(
            "CUST-101".into(),
            txns(&[
                ("2024-09-15", 1200.0, "debit", "Rent payment"),
                ("2024-10-01", 800.0, "debit", "Utilities"),
                ("2024-11-05", 1500.0, "credit", "Salary deposit"),
                ("2024-11-20", 900.0, "debit", "Groceries/misc"),
            ]),
        );
        data.transactions.insert(
            "CUST-102".into(),
            txns(&[
                ("2024-09-10", 9200.0, "credit", "Cash deposit - Branch A"),
                ("2024-09-12", 9500.0, "credit", "Cash deposit - Branch A"),
                ("2024-09-15", 9800.0, "credit", "Cash deposit - Branch B"),
                ("2024-10-01", 15000.0, "debit", "Supplier payment"),
            ]),
        );
        data.transactions.insert(
            "CUST-103".into(),
            txns(&[
                ("2024-06-01", 45000.0, "credit", "Project payment"),
                ("2024-07-15", 38000.0, "credit", "Project payment"),
                ("2024-09-01", 52000.0, "credit", "Project payment"),
                ("2024-12-01", 48000.0, "credit", "Inbound wire"),
                ("2024-12-01", 8500.0, "debit", "Wire transfer"),
                ("2024-12-02", 7200.0, "debit", "Wire transfer"),
                ("2024-12-02", 9100.0, "debit", "Wire transfer"),
                ("2024-12-03", 6800.0, "debit", "Wire transfer"),
                ("2024-12-03", 11500.0, "debit", "Wire transfer"),
            ]),
        );
        data.transactions.insert(
            "CUST-104".into(),
            txns(&[
                ("2024-08-15", 5500.0, "credit", "Client payment"),
                ("2024-09-20", 6200.0, "credit", "Client payment"),
                ("2024-10-10", 4800.0, "credit", "Client payment"),
            ]),
        );
        data.transactions.insert(
            "CUST-105".into(),
            txns(&[
                ("2023-06-10", 2500.0, "credit", "Social security"),
                ("2023-07-10", 2500.0, "credit", "Social security"),
                ("2023-08-10", 2500.0, "credit", "Social security"),
            ]),
        );

        data.watchlist.insert(
            "Mahmoud Al-Hassan".into(),
            WatchlistEntry {
                entity_id: Some("SANC-9001".into()),
                jurisdiction: "High-Risk".into(),
                match_type: "CONFIRMED TERRORIST - OFAC SDN LIST".into(),
                list_source: Some("OFAC SDN".into()),
                category: Some("TERRORISM".into()),
                confidence: 0.98,
            },
        );
        data.watchlist.insert(
            "Deepak".into(),
            WatchlistEntry {
                entity_id: None,
                jurisdiction: "N/A".into(),
                match_type: "Common Name - False Positive".into(),
                list_source: None,
                category: None,
                confidence: 0.15,
            },
        );
        data.watchlist.insert(
            "Omar Terrorist Inc".into(),
            WatchlistEntry {
                entity_id: Some("SANC-9002".into()),
                jurisdiction: "Syria".into(),
                match_type: "CONFIRMED SANCTIONED ENTITY - UN SANCTIONS".into(),
                list_source: Some("UN Security Council".into()),
                category: Some("TERRORIST FINANCING".into()),
                confidence: 0.99,
            },
        );
        data.watchlist.insert(
            "Viktor Petrov".into(),
            WatchlistEntry {
                entity_id: Some("SANC-9003".into()),
                jurisdiction: "Russia".into(),
                match_type: "CONFIRMED - EU/US SANCTIONS".into(),
                list_source: Some("OFAC/EU Consolidated List".into()),
                category: Some("SANCTIONED OLIGARCH".into()),
                confidence: 0.95,
            },
        );

        for (id, hits, summary) in [
            ("CUST-101", 0, "No adverse media found for Rohitash"),
            ("CUST-102", 0, "No adverse media found for Priya"),
            ("CUST-103", 0, "No adverse media found for Rajesh Traders Pvt Ltd"),
            (
                "CUST-104",
                1,
                "1 news article about business dispute (civil matter, resolved) - Anjali",
            ),
            ("CUST-105", 0, "No adverse media found for Vikram"),
        ] {
            data.adverse_media.insert(
                id.into(),
                AdverseMediaRecord {
                    hits,
                    summary: summary.into(),
                },
            );
        }

        data.linked_aggregates.insert("CUST-102".into(), 28_500.0);
        data.dormant_months.insert("CUST-105".into(), 16);

        data
    }

    pub fn add_customer(&mut self, profile: CustomerProfile) {
        self.customers.insert(profile.customer_id.clone(), profile);
    }
}

fn txns(rows: &[(&str, f64, &str, &str)]) -> Vec<TransactionRow> {
    rows.iter()
        .map(|(date, amount, kind, description)| TransactionRow {
            date: date.to_string(),
            amount: *amount,
            kind: kind.to_string(),
            description: description.to_string(),
        })
        .collect()
}
