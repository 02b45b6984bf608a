pub mod engine;

pub use engine::WorkflowEngine;
