use thiserror::Error;

#[derive(Debug, Error)]
pub enum AegisError {
    // Reasoning-step errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Lookup capability errors
    #[error("Lookup capability not found: {0}")]
    LookupNotFound(String),

    #[error("Lookup failed: {capability}: {message}")]
    LookupFailed { capability: String, message: String },

    #[error("Lookup input validation failed: {0}")]
    LookupValidation(String),

    // Workflow errors — fatal by design, the engine never routes around these
    #[error("Invalid routing directive: {0}")]
    InvalidDirective(String),

    #[error("Unknown workflow node: {0}")]
    UnknownNode(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // Storage errors
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    // Action dispatch errors
    #[error("Action dispatch failed: {0}")]
    Dispatch(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AegisError>;
