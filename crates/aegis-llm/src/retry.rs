use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use aegis_core::config::{ModelConfig, RetryConfig};
use aegis_core::error::{AegisError, Result};
use aegis_core::traits::LlmClient;

/// An LLM client that retries transient failures with backoff. Routing and
/// adjudication already degrade gracefully when a call ultimately fails;
/// this wrapper just keeps transient provider hiccups out of the audit
/// trail.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &AegisError) -> bool {
    match e {
        AegisError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn complete(
        &self,
        config: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();
        let system_prompt = system_prompt.to_string();
        let user_prompt = user_prompt.to_string();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut last_err = None;

            for attempt in 0..=max_retries {
                match self
                    .inner
                    .complete(&config, &system_prompt, &user_prompt)
                    .await
                {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if is_retryable(&e) && attempt < max_retries {
                            let backoff = calculate_backoff(attempt, &self.retry_config);
                            warn!(
                                attempt = attempt + 1,
                                max_retries,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %e,
                                "Retrying LLM request"
                            );
                            tokio::time::sleep(backoff).await;
                            last_err = Some(e);
                            continue;
                        }
                        last_err = Some(e);
                        break;
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| AegisError::LlmRequest("request failed".into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyClient {
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    impl LlmClient for FlakyClient {
        fn complete(
            &self,
            _config: &ModelConfig,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> BoxFuture<'_, Result<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail_first = self.fail_first;
            Box::pin(async move {
                if n < fail_first {
                    Err(AegisError::LlmRequest("HTTP 503: overloaded".into()))
                } else {
                    Ok("ok".to_string())
                }
            })
        }
    }

    fn model() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            api_key: Some("sk-test".into()),
            base_url: None,
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(
            Box::new(FlakyClient {
                calls: calls.clone(),
                fail_first: 2,
            }),
            fast_retry(),
        );

        let out = client.complete(&model(), "sys", "user").await.unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(
            Box::new(FlakyClient {
                calls: calls.clone(),
                fail_first: 10,
            }),
            fast_retry(),
        );

        assert!(client.complete(&model(), "sys", "user").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        struct FatalClient(Arc<AtomicU32>);
        impl LlmClient for FatalClient {
            fn complete(
                &self,
                _c: &ModelConfig,
                _s: &str,
                _u: &str,
            ) -> BoxFuture<'_, Result<String>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(AegisError::LlmParse("bad shape".into())) })
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(Box::new(FatalClient(calls.clone())), fast_retry());
        assert!(client.complete(&model(), "sys", "user").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
