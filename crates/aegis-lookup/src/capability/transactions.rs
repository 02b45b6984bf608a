use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use aegis_core::error::{AegisError, Result};
use aegis_core::traits::LookupCapability;
use aegis_core::types::LookupOutcome;

use crate::fixture::FixtureDataset;
use crate::set::names;

const HIGH_VALUE_THRESHOLD: f64 = 5_000.0;

/// Historical transaction query with velocity aggregates.
pub struct TransactionHistory {
    data: Arc<FixtureDataset>,
}

impl TransactionHistory {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_lookback")]
    lookback_days: u32,
}

fn default_lookback() -> u32 {
    90
}

impl LookupCapability for TransactionHistory {
    fn name(&self) -> &str {
        names::TRANSACTION_HISTORY
    }

    fn description(&self) -> &str {
        "Query historical transactions for a subject: raw rows plus max, average, and high-value counts."
    }

    fn lookup(
        &self,
        subject_id: &str,
        params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            let params: HistoryParams = if params.is_null() {
                HistoryParams {
                    lookback_days: default_lookback(),
                }
            } else {
                serde_json::from_value(params)
                    .map_err(|e| AegisError::LookupValidation(e.to_string()))?
            };

            debug!(subject = %subject_id, lookback_days = params.lookback_days, "Querying transaction history");

            let Some(rows) = self.data.transactions.get(&subject_id) else {
                return Ok(LookupOutcome::NotFound);
            };

            let max_txn = rows.iter().map(|t| t.amount).fold(0.0_f64, f64::max);
            let avg_txn = if rows.is_empty() {
                0.0
            } else {
                rows.iter().map(|t| t.amount).sum::<f64>() / rows.len() as f64
            };
            let high_value_count = rows
                .iter()
                .filter(|t| t.amount > HIGH_VALUE_THRESHOLD)
                .count();

            Ok(LookupOutcome::found(json!({
                "customer_id": subject_id,
                "transactions": rows,
                "historical_max_txn": max_txn,
                "historical_avg_txn": (avg_txn * 100.0).round() / 100.0,
                "high_value_count_90d": high_value_count,
                "total_transactions": rows.len(),
            })))
        })
    }
}

/// Linked-account aggregation over the trailing 7-day window.
pub struct LinkedAccounts {
    data: Arc<FixtureDataset>,
}

impl LinkedAccounts {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

impl LookupCapability for LinkedAccounts {
    fn name(&self) -> &str {
        names::LINKED_ACCOUNTS
    }

    fn description(&self) -> &str {
        "Find accounts linked to a subject and their aggregate recent deposits."
    }

    fn lookup(
        &self,
        subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            debug!(subject = %subject_id, "Checking linked accounts");

            let aggregate = self
                .data
                .linked_aggregates
                .get(&subject_id)
                .copied()
                .unwrap_or(0.0);

            Ok(LookupOutcome::found(json!({
                "customer_id": subject_id,
                "linked_accounts": [],
                "linked_account_count": 0,
                "aggregate_recent_deposits": aggregate,
            })))
        })
    }
}

/// Account dormancy status.
pub struct DormancyCheck {
    data: Arc<FixtureDataset>,
}

impl DormancyCheck {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

impl LookupCapability for DormancyCheck {
    fn name(&self) -> &str {
        names::DORMANCY_CHECK
    }

    fn description(&self) -> &str {
        "Check whether a subject's account is dormant and for how long."
    }

    fn lookup(
        &self,
        subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            debug!(subject = %subject_id, "Checking account dormancy");

            let Some(rows) = self.data.transactions.get(&subject_id) else {
                return Ok(LookupOutcome::NotFound);
            };

            let dormant_months = self
                .data
                .dormant_months
                .get(&subject_id)
                .copied()
                .unwrap_or(0);

            let recent: Vec<_> = rows.iter().rev().take(5).rev().collect();

            Ok(LookupOutcome::found(json!({
                "customer_id": subject_id,
                "is_dormant": dormant_months > 0,
                "dormant_months": dormant_months,
                "last_activity_date": rows.last().map(|t| t.date.as_str()).unwrap_or("N/A"),
                "recent_transactions": recent,
            })))
        })
    }
}
