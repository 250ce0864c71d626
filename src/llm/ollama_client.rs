use crate::error::ProviderError;
use crate::llm::{CompletionProvider, SYSTEM_INSTRUCTION};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, timeout};

const HEALTH_TIMEOUT_MS: u64 = 2000;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Local Ollama server, `/api/generate` in JSON mode.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    name: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: format!("ollama:{}", model),
            model,
        }
    }

    pub async fn health_check(&self) -> bool {
        let probe = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send();

        matches!(
            timeout(Duration::from_millis(HEALTH_TIMEOUT_MS), probe).await,
            Ok(Ok(response)) if response.status().is_success()
        )
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            system: SYSTEM_INSTRUCTION,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let ollama_response: OllamaResponse = response.json().await?;
        if ollama_response.response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(self.name.clone()));
        }

        Ok(ollama_response.response)
    }
}
