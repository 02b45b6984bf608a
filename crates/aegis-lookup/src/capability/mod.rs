mod context;
mod transactions;

pub use context::{AdverseMedia, KycProfile, WatchlistLookup};
pub use transactions::{DormancyCheck, LinkedAccounts, TransactionHistory};
