use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub mod gemini;
pub mod remote;

/// Core trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Count the prompt's tokens without generating anything.
    async fn count_tokens(&self, _prompt: &str) -> Result<usize> {
        anyhow::bail!("token counting is not supported by this provider")
    }
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// POST `body` as JSON under an overall timeout and decode the JSON reply.
///
/// Non-2xx replies become `"<api> API error <status>: <body>"`.
pub(crate) async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
    timeout: Duration,
    api: &str,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = tokio::time::timeout(timeout, request.json(body).send())
        .await
        .with_context(|| format!("{} request timed out", api))?
        .with_context(|| format!("{} HTTP request failed", api))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("{} API error {}: {}", api, status, text);
    }

    response
        .json()
        .await
        .with_context(|| format!("failed to parse {} response", api))
}

/// Send one prompt and return the generated text.
///
/// The token count is only informational: if the provider cannot count, the
/// failure is logged and the prompt is sent anyway.
pub async fn chat<P: LlmProvider + ?Sized>(provider: &P, prompt: &str) -> Result<String> {
    let counted = match provider.count_tokens(prompt).await {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            debug!("error counting tokens: {:#}", e);
            None
        }
    };

    debug!("sending prompt to model:\n{}", prompt);
    match counted {
        Some(tokens) => info!("chatting with model: {} tokens", tokens),
        None => info!("chatting with model"),
    }

    let response = provider.generate(LlmRequest::from_prompt(prompt)).await?;
    info!(
        model = %response.model,
        "model responded: {} prompt / {} completion tokens",
        response.usage.prompt_tokens,
        response.usage.completion_tokens
    );
    Ok(response.content)
}
