//! Anthropic messages provider.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{DraftingOracle, OracleRequest, ProviderKind};

/// Default Anthropic model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

const API_VERSION: &str = "2023-06-01";

/// Anthropic messages client
#[derive(Clone)]
pub struct AnthropicOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicOracle {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        url::Url::parse(base_url).context("Invalid Anthropic base URL")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "Anthropic oracle initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[async_trait]
impl DraftingOracle for AnthropicOracle {
    #[instrument(skip(self, request), fields(model = %self.model, task = %request.task))]
    async fn complete(&self, request: &OracleRequest<'_>) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);

        // No JSON mode on this API, rely on the instruction
        let system = if request.json_object {
            format!(
                "{}\n\nAntworte ausschließlich mit gültigem JSON. Keine Markdown-Codeblöcke, keine Erklärungen.",
                request.system
            )
        } else {
            request.system.to_string()
        };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &system,
            messages: [Message {
                role: "user",
                content: request.user,
            }],
        };

        debug!(url = %url, "Anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "Failed to read Anthropic error body");
                    String::new()
                }
            };
            bail!("Anthropic API error {}: {}", status, body);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Invalid Anthropic response")?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(anyhow!("Empty response from Anthropic"));
        }
        Ok(text)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_model() {
        let oracle =
            AnthropicOracle::new("https://api.anthropic.com/", "key", DEFAULT_MODEL, 30).unwrap();
        assert_eq!(oracle.base_url, "https://api.anthropic.com");
        assert_eq!(oracle.model_name(), DEFAULT_MODEL);
        assert_eq!(oracle.provider(), ProviderKind::Anthropic);
    }
}
