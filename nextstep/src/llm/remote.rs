use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ApiError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Chat-completions endpoint speaking the OpenAI wire format (the Lovable AI gateway,
/// OpenAI itself, or any compatible proxy).
pub struct RemoteLlmProvider {
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_tokens: usize,
    temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    /// `endpoint` is the full completions URL, not a base path.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(30),
            max_tokens: 200,
            temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    /// Values used when a request leaves them unset.
    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn completion_body<'a>(&'a self, request: &'a LlmRequest) -> CompletionRequest<'a> {
        let system = request
            .system
            .as_deref()
            .map(|content| WireMessage { role: "system", content });
        let user = WireMessage {
            role: "user",
            content: &request.prompt,
        };

        CompletionRequest {
            model: &self.model,
            messages: system.into_iter().chain(std::iter::once(user)).collect(),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
        }
    }

    async fn request_completion(&self, body: &CompletionRequest<'_>) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("LLM HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        response
            .json::<CompletionResponse>()
            .await
            .context("Failed to decode completion response")
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let limit = request.timeout_seconds.map(Duration::from_secs).unwrap_or(self.timeout);
        let body = self.completion_body(&request);

        // One deadline covers the round trip and reading the body
        let completion = tokio::time::timeout(limit, self.request_completion(&body))
            .await
            .context("LLM request timed out")??;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage: completion.usage.map(UsageMetadata::from).unwrap_or_default(),
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    // null on filtered completions
    content: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl From<WireUsage> for UsageMetadata {
    fn from(u: WireUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}
