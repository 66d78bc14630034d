//! Live adapter for the `ChatClient` port using a local Ollama server.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::llm::{ChatClient, ChatFuture, ChatRequest, ChatResponse};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Live chat client for Ollama's `/api/chat` endpoint.
pub struct OllamaChatClient {
    base_url: String,
    client: Client,
}

impl OllamaChatClient {
    /// Creates a client pointed at `base_url`, or the local default.
    #[must_use]
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

fn build_request(request: &ChatRequest) -> OllamaRequest<'_> {
    OllamaRequest {
        model: &request.options.model,
        messages: vec![
            OllamaMessage { role: "system", content: &request.system },
            OllamaMessage { role: "user", content: &request.user },
        ],
        stream: false,
        options: OllamaOptions {
            temperature: request.options.temperature,
            num_predict: request.options.max_tokens,
        },
    }
}

impl ChatClient for OllamaChatClient {
    fn chat(&self, request: &ChatRequest) -> ChatFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let url = format!("{}/api/chat", self.base_url);
            let response = self
                .client
                .post(&url)
                .json(&build_request(&request))
                .send()
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    format!("Ollama request failed: {e}. Is Ollama running?").into()
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(format!("Ollama API error ({}): {body}", status.as_u16()).into());
            }

            let parsed: OllamaResponse =
                response.json().await.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    format!("Failed to parse Ollama response: {e}").into()
                })?;

            Ok(ChatResponse {
                text: parsed.message.content,
                prompt_tokens: parsed.prompt_eval_count.unwrap_or(0),
                completion_tokens: parsed.eval_count.unwrap_or(0),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm::ChatOptions;

    #[test]
    fn default_url_and_trailing_slash() {
        assert_eq!(OllamaChatClient::new(None).base_url, DEFAULT_BASE_URL);
        assert_eq!(
            OllamaChatClient::new(Some("http://gpu-box:11434/")).base_url,
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn request_puts_system_before_user() {
        let request = ChatRequest {
            system: "sys".into(),
            user: "usr".into(),
            options: ChatOptions { model: "qwen2.5-coder".into(), temperature: 0.1, max_tokens: 64 },
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["options"]["num_predict"], 64);
    }
}
