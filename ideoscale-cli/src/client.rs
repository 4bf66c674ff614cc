/// OpenAI-compatible chat completions client.
use async_trait::async_trait;
use ideoscale_core::{CallError, CallParams, ChatTurn, ModelClient, Role};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    top_p: f64,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> OpenAiClient {
        OpenAiClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn send(&self, turns: &[ChatTurn], params: &CallParams) -> Result<String, CallError> {
        let request = ChatCompletionRequest {
            model: &params.model,
            messages: turns
                .iter()
                .map(|turn| WireMessage {
                    role: role_name(turn.role),
                    content: &turn.content,
                })
                .collect(),
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let mut builder = self.http.post(self.url()).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CallError::Transient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            let message = format!("API returned {status}: {snippet}");
            // Credential problems will not heal on retry; everything else
            // (rate limits, gateway errors) is worth another attempt.
            return if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                Err(CallError::Fatal(message))
            } else {
                Err(CallError::Transient(message))
            };
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("failed to parse response JSON: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CallError::Transient("response carried no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalizes_trailing_slash() {
        let client = OpenAiClient::new("https://api.example.com/", None);
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");

        let client = OpenAiClient::new("https://api.example.com", None);
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4.1-mini",
            messages: vec![
                WireMessage { role: "user", content: "question" },
                WireMessage { role: "assistant", content: "answer" },
            ],
            temperature: 0.0,
            top_p: 1.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4.1-mini");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["temperature"], 0.0);
    }
}
