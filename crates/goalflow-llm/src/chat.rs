use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use goalflow_core::config::ModelConfig;
use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::Generator;

/// OpenAI-compatible chat-completions client. Works with Groq, OpenAI, Ollama, vLLM, etc.
pub struct ChatCompletionsClient {
    http: Client,
    config: ModelConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a response body, trimmed.
fn parse_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(GoalflowError::EmptyResponse);
    }
    Ok(text.to_string())
}

impl Generator for ChatCompletionsClient {
    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let body = ChatRequest {
                model: &self.config.model_id,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: system_prompt,
                    },
                    ChatMessage {
                        role: "user",
                        content: user_prompt,
                    },
                ],
                max_tokens: self.config.max_tokens,
                temperature,
            };

            let mut req = self
                .http
                .post(self.config.endpoint())
                .timeout(Duration::from_secs(self.config.timeout_secs))
                .json(&body);

            if let Some(api_key) = &self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            debug!(model = %self.config.model_id, temperature, "Sending generator request");

            let response = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    GoalflowError::Network(format!(
                        "timeout after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    GoalflowError::Network(e.to_string())
                }
            })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| GoalflowError::Network(e.to_string()))?;

            if !status.is_success() {
                return Err(GoalflowError::Remote {
                    status: status.as_u16(),
                    body: text,
                });
            }

            parse_content(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  2 + 3 * 5\n"}}]}"#;
        assert_eq!(parse_content(body).unwrap(), "2 + 3 * 5");
    }

    #[test]
    fn test_parse_content_empty() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#;
        assert!(matches!(
            parse_content(body),
            Err(GoalflowError::EmptyResponse)
        ));

        let body = r#"{"choices":[]}"#;
        assert!(matches!(
            parse_content(body),
            Err(GoalflowError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_content_malformed() {
        assert!(matches!(
            parse_content("<html>gateway</html>"),
            Err(GoalflowError::Json(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let req = ChatRequest {
            model: "llama-3.1-8b-instant",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 64,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llama-3.1-8b-instant");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }
}
