//! Live adapter for the `ChatClient` port using the Anthropic messages API.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::llm::{ChatClient, ChatFuture, ChatRequest, ChatResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Live chat client that calls the Anthropic messages API.
pub struct AnthropicChatClient {
    client: Client,
    url: String,
    api_key_env: String,
}

impl AnthropicChatClient {
    /// Creates a client reading its API key from `api_key_env` at call time.
    ///
    /// `base_url` overrides the public endpoint (proxies, gateways).
    #[must_use]
    pub fn new(base_url: Option<&str>, api_key_env: &str) -> Self {
        let url = base_url.map_or_else(
            || ANTHROPIC_API_URL.to_string(),
            |base| format!("{}/v1/messages", base.trim_end_matches('/')),
        );
        Self { client: Client::new(), url, api_key_env: api_key_env.to_string() }
    }
}

/// Request body sent to the Anthropic messages API.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

/// A single message in the Anthropic API request.
#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Top-level response from the Anthropic messages API.
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// A content block in the Anthropic response.
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Token usage reported by the Anthropic API.
#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Error response from the Anthropic API.
#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

/// Detail inside an Anthropic error response.
#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl ChatClient for AnthropicChatClient {
    fn chat(&self, request: &ChatRequest) -> ChatFuture<'_> {
        let request = request.clone();

        Box::pin(async move {
            let api_key = env::var(&self.api_key_env).map_err(|_| {
                Box::<dyn std::error::Error + Send + Sync>::from(format!(
                    "{} environment variable not set",
                    self.api_key_env
                ))
            })?;

            let body = AnthropicRequest {
                model: &request.options.model,
                max_tokens: request.options.max_tokens,
                temperature: request.options.temperature,
                system: &request.system,
                messages: vec![AnthropicMessage { role: "user", content: &request.user }],
            };

            let response = self
                .client
                .post(&self.url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    format!("Anthropic API request failed: {e}").into()
                })?;

            let status = response.status();
            let response_text =
                response.text().await.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    format!("Failed to read Anthropic API response: {e}").into()
                })?;

            if !status.is_success() {
                let msg = serde_json::from_str::<AnthropicError>(&response_text)
                    .map(|e| e.error.message)
                    .unwrap_or(response_text);
                return Err(format!("Anthropic API error ({}): {msg}", status.as_u16()).into());
            }

            parse_response(&response_text)
        })
    }
}

fn parse_response(body: &str) -> Result<ChatResponse, Box<dyn std::error::Error + Send + Sync>> {
    let api_response: AnthropicResponse = serde_json::from_str(body).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            format!("Failed to parse Anthropic API response: {e}").into()
        },
    )?;

    let text = api_response.content.into_iter().map(|block| block.text).collect::<String>();

    Ok(ChatResponse {
        text,
        prompt_tokens: api_response.usage.input_tokens,
        completion_tokens: api_response.usage.output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm::ChatOptions;

    #[test]
    fn base_url_override_appends_messages_path() {
        let client = AnthropicChatClient::new(Some("http://proxy.local/"), "KEY");
        assert_eq!(client.url, "http://proxy.local/v1/messages");
        let default = AnthropicChatClient::new(None, "KEY");
        assert_eq!(default.url, ANTHROPIC_API_URL);
    }

    #[test]
    fn request_body_carries_system_prompt() {
        let request = ChatRequest {
            system: "You write code.".into(),
            user: "Write main.py".into(),
            options: ChatOptions { model: "m".into(), temperature: 0.2, max_tokens: 10 },
        };
        let body = AnthropicRequest {
            model: &request.options.model,
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
            system: &request.system,
            messages: vec![AnthropicMessage { role: "user", content: &request.user }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "You write code.");
        assert_eq!(json["messages"][0]["content"], "Write main.py");
    }

    #[test]
    fn parse_response_concatenates_blocks() {
        let body = r#"{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}],
                       "usage":{"input_tokens":3,"output_tokens":4}}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "ab");
        assert_eq!(response.completion_tokens, 4);
    }
}
