pub mod chat_client;
pub mod ollama_client;

pub use chat_client::ChatCompletionsProvider;
pub use ollama_client::OllamaProvider;

use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful scheduling assistant. Always respond in JSON.";

/// A text-completion backend. The reply is expected to be JSON but is not checked here.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Ordered list of providers tried until one answers.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn CompletionProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::from_secs(60))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        if self.providers.is_empty() {
            return Err(ProviderError::NotConfigured);
        }

        let mut last_error = String::new();

        for provider in &self.providers {
            let name = provider.name();
            debug!(provider = name, "requesting completion");

            let error = match timeout(self.timeout, provider.complete(prompt)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
                Ok(Ok(_)) => ProviderError::EmptyResponse(name.to_string()),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout {
                    provider: name.to_string(),
                    seconds: self.timeout.as_secs(),
                },
            };

            warn!(provider = name, error = %error, "completion provider failed");
            last_error = error.to_string();
        }

        Err(ProviderError::AllFailed(last_error))
    }
}
