use std::collections::HashMap;
use std::sync::Arc;

use aegis_core::error::{AegisError, Result};
use aegis_core::traits::LookupCapability;
use aegis_core::types::LookupOutcome;

use crate::fixture::FixtureDataset;

/// Canonical names of the required capabilities.
pub mod names {
    pub const TRANSACTION_HISTORY: &str = "transaction_history";
    pub const LINKED_ACCOUNTS: &str = "linked_accounts";
    pub const DORMANCY_CHECK: &str = "dormancy_check";
    pub const KYC_PROFILE: &str = "kyc_profile";
    pub const ADVERSE_MEDIA: &str = "adverse_media";
    pub const WATCHLIST_LOOKUP: &str = "watchlist_lookup";
}

/// Registry of lookup capabilities, injected into every agent. Which agent
/// calls which capability is the agent's business, not the registry's.
pub struct LookupSet {
    capabilities: HashMap<String, Arc<dyn LookupCapability>>,
}

impl LookupSet {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability.
    pub fn register(&mut self, capability: impl LookupCapability) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, Arc::new(capability));
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LookupCapability>> {
        self.capabilities.get(name).cloned()
    }

    /// List registered capability names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Invoke a capability by name. No timeout: the caller suspends until
    /// the capability returns or errors.
    pub async fn lookup(
        &self,
        name: &str,
        subject_id: &str,
        params: serde_json::Value,
    ) -> Result<LookupOutcome> {
        let capability = self
            .get(name)
            .ok_or_else(|| AegisError::LookupNotFound(name.to_string()))?;

        capability.lookup(subject_id, params).await
    }

    /// A set backed by the seeded fixture dataset, with all six required
    /// capabilities registered.
    pub fn with_fixtures(dataset: Arc<FixtureDataset>) -> Self {
        let mut set = Self::new();
        set.register(crate::capability::TransactionHistory::new(dataset.clone()));
        set.register(crate::capability::LinkedAccounts::new(dataset.clone()));
        set.register(crate::capability::DormancyCheck::new(dataset.clone()));
        set.register(crate::capability::KycProfile::new(dataset.clone()));
        set.register(crate::capability::AdverseMedia::new(dataset.clone()));
        set.register(crate::capability::WatchlistLookup::new(dataset));
        set
    }
}

impl Default for LookupSet {
    fn default() -> Self {
        Self::new()
    }
}
