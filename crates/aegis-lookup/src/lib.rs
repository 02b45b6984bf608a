pub mod capability;
pub mod fixture;
pub mod scenarios;
pub mod set;

pub use fixture::FixtureDataset;
pub use set::{names, LookupSet};
