pub mod client;
pub mod parse;
pub mod retry;

use aegis_core::config::ModelConfig;
use aegis_core::traits::LlmClient;

pub use client::OpenAiCompatClient;
pub use parse::extract_json_object;
pub use retry::RetryingClient;

/// Create an LLM client for the configured provider. Everything speaking
/// the OpenAI chat-completions dialect (OpenAI, Ollama, vLLM, Groq,
/// OpenRouter, Azure with a base_url) goes through the same client.
pub fn create_client(_config: &ModelConfig) -> Box<dyn LlmClient> {
    Box::new(OpenAiCompatClient::new())
}
