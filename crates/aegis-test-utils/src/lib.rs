//! Test doubles shared across the Aegis crates: a scripted LLM client,
//! misbehaving lookup capabilities, and a capturing action dispatcher.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;

use aegis_core::config::ModelConfig;
use aegis_core::error::{AegisError, Result};
use aegis_core::traits::{ActionDispatcher, LlmClient, LookupCapability};
use aegis_core::types::{AlertContext, LookupOutcome, OutboundAction, ScenarioCode};

/// An `LlmClient` that replays a fixed script of responses and failures.
/// Prompts are recorded for assertions.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(text.into()));
        self
    }

    /// Queue a request failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(AegisError::LlmRequest(message.into())));
        self
    }

    /// The user prompts seen so far, in call order.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(
        &self,
        _config: &ModelConfig,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> BoxFuture<'_, Result<String>> {
        let prompt = user_prompt.to_string();
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AegisError::LlmRequest("script exhausted".into())))
        })
    }
}

/// A lookup capability that always fails.
pub struct FailingLookup {
    name: String,
}

impl FailingLookup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LookupCapability for FailingLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn lookup(
        &self,
        _subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        Box::pin(async move {
            Err(AegisError::LookupFailed {
                capability: self.name.clone(),
                message: "injected failure".into(),
            })
        })
    }
}

/// A lookup capability that returns the same value for every subject.
pub struct StaticLookup {
    name: String,
    value: serde_json::Value,
}

impl StaticLookup {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl LookupCapability for StaticLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "static value"
    }

    fn lookup(
        &self,
        _subject_id: &str,
        _params: serde_json::Value,
    ) -> BoxFuture<'_, Result<LookupOutcome>> {
        let value = self.value.clone();
        Box::pin(async move { Ok(LookupOutcome::Found(value)) })
    }
}

/// An `ActionDispatcher` that records every dispatched action.
#[derive(Default)]
pub struct CapturingDispatcher {
    dispatched: Mutex<Vec<OutboundAction>>,
}

impl CapturingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> Vec<OutboundAction> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl ActionDispatcher for CapturingDispatcher {
    fn dispatch(
        &self,
        _alert: &AlertContext,
        action: OutboundAction,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.dispatched.lock().unwrap().push(action);
            Ok(())
        })
    }
}

/// An `ActionDispatcher` that refuses every action.
#[derive(Default)]
pub struct FailingDispatcher;

impl ActionDispatcher for FailingDispatcher {
    fn dispatch(
        &self,
        _alert: &AlertContext,
        action: OutboundAction,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            Err(AegisError::Dispatch(format!(
                "injected failure dispatching {}",
                action.as_str()
            )))
        })
    }
}

/// A model config that never touches the network (pair with `ScriptedLlm`).
pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        provider: "openai".into(),
        model_id: "test-model".into(),
        api_key: Some("sk-test".into()),
        base_url: None,
        temperature: 0.0,
        max_tokens: 256,
    }
}

/// The demo alert for one typology, from the seeded catalog.
pub fn demo_alert(code: ScenarioCode) -> AlertContext {
    aegis_lookup::scenarios::by_code(code)
}
