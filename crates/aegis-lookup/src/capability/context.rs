use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use aegis_core::error::{AegisError, Result};
use aegis_core::traits::LookupCapability;
use aegis_core::types::LookupOutcome;

use crate::fixture::FixtureDataset;
use crate::set::names;

/// KYC/identity profile lookup.
pub struct KycProfile {
    data: Arc<FixtureDataset>,
}

impl KycProfile {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

impl LookupCapability for KycProfile {
    fn name(&self) -> &str {
        names::KYC_PROFILE
    }

    fn description(&self) -> &str {
        "Retrieve a subject's KYC profile: identity, occupation, declared income, risk rating."
    }

    fn lookup(
        &self,
        subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            debug!(subject = %subject_id, "Retrieving KYC profile");

            match self.data.customers.get(&subject_id) {
                Some(profile) => Ok(LookupOutcome::found(serde_json::to_value(profile)?)),
                None => Ok(LookupOutcome::NotFound),
            }
        })
    }
}

/// Adverse-media / negative-news search.
pub struct AdverseMedia {
    data: Arc<FixtureDataset>,
}

impl AdverseMedia {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

impl LookupCapability for AdverseMedia {
    fn name(&self) -> &str {
        names::ADVERSE_MEDIA
    }

    fn description(&self) -> &str {
        "Search adverse media and OSINT sources for mentions of a subject."
    }

    fn lookup(
        &self,
        subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let subject_id = subject_id.to_string();
        Box::pin(async move {
            debug!(subject = %subject_id, "Searching adverse media");

            match self.data.adverse_media.get(&subject_id) {
                Some(record) => Ok(LookupOutcome::found(serde_json::to_value(record)?)),
                None => Ok(LookupOutcome::NotFound),
            }
        })
    }
}

/// Watchlist lookup against OFAC / UN / EU consolidated lists. Keyed by the
/// counterparty name, not the subject id.
pub struct WatchlistLookup {
    data: Arc<FixtureDataset>,
}

impl WatchlistLookup {
    pub fn new(data: Arc<FixtureDataset>) -> Self {
        Self { data }
    }
}

#[derive(Deserialize)]
struct WatchlistParams {
    counterparty_name: String,
}

impl LookupCapability for WatchlistLookup {
    fn name(&self) -> &str {
        names::WATCHLIST_LOOKUP
    }

    fn description(&self) -> &str {
        "Look up a counterparty name in sanctions watchlists (OFAC, UN, EU)."
    }

    fn lookup(
        &self,
        _subject_id: &str,
        params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        Box::pin(async move {
            let params: WatchlistParams = serde_json::from_value(params)
                .map_err(|e| AegisError::LookupValidation(e.to_string()))?;

            debug!(counterparty = %params.counterparty_name, "Sanctions watchlist lookup");

            // A miss is an explicit no-match record, never an error: the
            // adjudication rules distinguish "checked, clean" from
            // "never checked".
            let entry = self.data.watchlist.get(&params.counterparty_name);
            let mut value = match entry {
                Some(e) => {
                    if e.is_confirmed() {
                        warn!(
                            counterparty = %params.counterparty_name,
                            match_type = %e.match_type,
                            confidence = e.confidence,
                            "Confirmed watchlist match"
                        );
                    }
                    serde_json::to_value(e)?
                }
                None => json!({
                    "entity_id": null,
                    "jurisdiction": "N/A",
                    "match_type": "No Match",
                    "list_source": null,
                    "category": null,
                    "confidence": 0.0,
                }),
            };
            value["counterparty_name"] = json!(params.counterparty_name);

            Ok(LookupOutcome::found(value))
        })
    }
}
