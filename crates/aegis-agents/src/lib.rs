pub mod adjudicator;
pub mod context_gatherer;
pub mod conversational;
pub mod executor;
pub mod generative;
pub mod investigator;
pub mod router;
pub mod rules;

pub use adjudicator::Adjudicator;
pub use context_gatherer::ContextGatherer;
pub use conversational::Conversational;
pub use executor::{ActionExecutor, LogDispatcher};
pub use generative::GenerativeDecision;
pub use investigator::Investigator;
pub use router::{DeterministicRouter, GenerativeRouter};
pub use rules::{EvidenceSummary, RuleTable};
