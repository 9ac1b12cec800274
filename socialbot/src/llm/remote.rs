//! Any server speaking the OpenAI `chat/completions` protocol (OpenAI,
//! Ollama, vLLM, llama.cpp server...). Selected with `llm.adapter = "remote"`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{post_json, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Generation settings applied when a request leaves them unset.
#[derive(Debug, Clone, Copy)]
struct Defaults {
    timeout: Duration,
    max_tokens: usize,
    temperature: f32,
}

pub struct RemoteLlmProvider {
    endpoint: String,
    api_key: String,
    model: String,
    defaults: Defaults,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    /// `endpoint` is the full completions URL, e.g.
    /// `http://localhost:11434/v1/chat/completions`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            defaults: Defaults {
                timeout: Duration::from_secs(60),
                max_tokens: 1024,
                temperature: 0.7,
            },
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.defaults = Defaults {
            timeout: Duration::from_secs(timeout_secs),
            max_tokens,
            temperature,
        };
        self
    }

    fn completion_request(&self, request: LlmRequest) -> (CompletionRequest, Duration) {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(request.prompt),
            }],
            max_tokens: request.max_tokens.unwrap_or(self.defaults.max_tokens),
            temperature: request.temperature.unwrap_or(self.defaults.temperature),
        };
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.defaults.timeout);
        (body, timeout)
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let (body, timeout) = self.completion_request(request);
        let http = self.client.post(&self.endpoint).bearer_auth(&self.api_key);

        let completion: CompletionResponse = post_json(http, &body, timeout, "LLM").await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .context("LLM response has no choices")?
            .message
            .content
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage: completion.usage.map(UsageMetadata::from).unwrap_or_default(),
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

// chat/completions wire format
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    /// Null when the server answers with tool calls only
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl From<CompletionUsage> for UsageMetadata {
    fn from(usage: CompletionUsage) -> Self {
        UsageMetadata {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}
