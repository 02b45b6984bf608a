use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AegisError, Result};

/// Top-level Aegis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Model for generative strategies. Optional: the deterministic router
    /// and rule-table adjudicator need no model at all.
    #[serde(default)]
    pub model: Option<ModelConfig>,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| AegisError::ConfigNotFound(path.display().to_string()))?;
        let config: AppConfig =
            toml::from_str(&raw).map_err(|e| AegisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workflow.max_iterations == 0 {
            return Err(AegisError::Config(
                "workflow.max_iterations must be at least 1".into(),
            ));
        }
        if self.workflow.max_node_retries == 0 {
            return Err(AegisError::Config(
                "workflow.max_node_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The model config, required because a generative strategy is enabled.
    /// Missing model or credential here is fatal, not recoverable: routing
    /// or adjudicating without the configured strategy could produce an
    /// unaudited action.
    pub fn require_model(&self) -> Result<&ModelConfig> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AegisError::Config("generative strategy enabled but [model] is not configured".into()))?;
        model.resolve_api_key()?;
        Ok(model)
    }

    pub fn checkpoint_db_path(&self) -> PathBuf {
        self.checkpoint
            .db_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("checkpoints/aegis.db"))
    }
}

/// Workflow engine bounds and strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Cap on total node executions per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Consecutive failures of a single node before the run aborts as stuck.
    #[serde(default = "default_max_node_retries")]
    pub max_node_retries: u32,
    /// Use the generative routing strategy (deterministic fallback always on).
    #[serde(default)]
    pub generative_router: bool,
    /// Use the generative adjudication strategy instead of the rule table.
    #[serde(default)]
    pub generative_adjudicator: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_node_retries: default_max_node_retries(),
            generative_router: false,
            generative_adjudicator: false,
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}

fn default_max_node_retries() -> u32 {
    3
}

/// Model and provider settings for generative strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    /// Raw key, or "${ENV_VAR}" to read from the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ModelConfig {
    /// Resolve the API key, expanding "${VAR}" references. A missing
    /// credential is a fatal configuration error.
    pub fn resolve_api_key(&self) -> Result<String> {
        let raw = self
            .api_key
            .as_deref()
            .ok_or_else(|| AegisError::MissingCredential("model.api_key".into()))?;

        if let Some(var) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            std::env::var(var).map_err(|_| AegisError::MissingCredential(var.to_string()))
        } else {
            Ok(raw.to_string())
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

/// Checkpoint persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_enabled")]
    pub enabled: bool,
    /// SQLite file path. Default: checkpoints/aegis.db
    #[serde(default)]
    pub db_path: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: None,
        }
    }
}

fn default_checkpoint_enabled() -> bool {
    true
}

/// Retry/backoff settings for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.workflow.max_iterations, 50);
        assert_eq!(config.workflow.max_node_retries, 3);
        assert!(config.checkpoint.enabled);
        assert!(config.model.is_none());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [workflow]
            max_iterations = 10
            generative_router = true

            [model]
            provider = "openai"
            model_id = "gpt-4o-mini"
            api_key = "${OPENAI_API_KEY}"
            temperature = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.workflow.max_iterations, 10);
        assert!(config.workflow.generative_router);
        let model = config.model.unwrap();
        assert_eq!(model.model_id, "gpt-4o-mini");
        assert_eq!(model.max_tokens, 1024);
    }

    #[test]
    fn env_reference_resolves() {
        std::env::set_var("AEGIS_TEST_KEY", "sk-test");
        let model = ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            api_key: Some("${AEGIS_TEST_KEY}".into()),
            base_url: None,
            temperature: 0.0,
            max_tokens: 1024,
        };
        assert_eq!(model.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn missing_credential_is_fatal() {
        let model = ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: 1024,
        };
        assert!(matches!(
            model.resolve_api_key(),
            Err(AegisError::MissingCredential(_))
        ));
    }

    #[test]
    fn zero_iteration_budget_rejected() {
        let config: std::result::Result<AppConfig, _> = toml::from_str(
            r#"
            [workflow]
            max_iterations = 0
            "#,
        );
        // serde accepts the value; validation rejects it on load
        let config = config.unwrap();
        assert!(config.validate().is_err());
    }
}
