pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{AegisError, Result};
pub use event::EventBus;
pub use state::{Patch, SessionState, StateUpdate};
pub use types::*;
