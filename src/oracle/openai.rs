//! OpenAI chat-completions provider.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{DraftingOracle, OracleRequest, ProviderKind};

/// Default OpenAI model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat-completions client
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        url::Url::parse(base_url).context("Invalid OpenAI base URL")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "OpenAI oracle initialized");

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
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl DraftingOracle for OpenAiOracle {
    #[instrument(skip(self, request), fields(model = %self.model, task = %request.task))]
    async fn complete(&self, request: &OracleRequest<'_>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: request.system,
                },
                Message {
                    role: "user",
                    content: request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .json_object
                .then_some(ResponseFormat { r#type: "json_object" }),
        };

        debug!(url = %url, "OpenAI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "Failed to read OpenAI error body");
                    String::new()
                }
            };
            bail!("OpenAI API error {}: {}", status, body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Invalid OpenAI response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Empty response from OpenAI"))
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::oracle::TaskKind;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length || n == 0 {
                        break;
                    }
                } else if n == 0 {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> OracleRequest<'static> {
        OracleRequest {
            task: TaskKind::TradeQuestions,
            system: "s",
            user: "u",
            max_tokens: 10,
            temperature: 0.2,
            json_object: false,
        }
    }

    #[tokio::test]
    async fn error_status_carries_the_body() {
        let base = serve_once(
            "HTTP/1.1 429 Too Many Requests\r\ncontent-type: text/plain\r\n\
             content-length: 10\r\nconnection: close\r\n\r\nrate limit",
        );
        let oracle = OpenAiOracle::new(&base, "k", DEFAULT_MODEL, 5).unwrap();
        let err = oracle.complete(&request()).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("429"), "{message}");
        assert!(message.contains("rate limit"), "{message}");
    }

    #[tokio::test]
    async fn unreadable_error_body_still_reports_the_status() {
        // Declared length exceeds what is sent before the connection closes.
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\
             connection: close\r\n\r\npartial",
        );
        let oracle = OpenAiOracle::new(&base, "k", DEFAULT_MODEL, 5).unwrap();
        let err = oracle.complete(&request()).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("500"), "{message}");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(OpenAiOracle::new("not a url", "k", DEFAULT_MODEL, 5).is_err());
    }

    #[test]
    fn json_mode_is_serialized_only_when_requested() {
        let body = ChatRequest {
            model: "m",
            messages: [
                Message {
                    role: "system",
                    content: "s",
                },
                Message {
                    role: "user",
                    content: "u",
                },
            ],
            max_tokens: 10,
            temperature: 0.5,
            response_format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][1]["content"], "u");
    }
}
