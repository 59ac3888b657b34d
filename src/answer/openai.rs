use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, send_with_retry, user_message, AnswerProvider, ProviderError, SYSTEM_PROMPT};
use crate::config::AnswerConfig;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const NAME: &str = "openai";

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, config: &AnswerConfig) -> Result<Self> {
        Ok(Self {
            api_key,
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        let user = user_message(query, context);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };

        let json = send_with_retry(NAME, self.max_retries, || {
            self.client
                .post(ENDPOINT)
                .bearer_auth(self.api_key.trim())
                .json(&body)
        })
        .await?;

        Ok(parse_response(json)?)
    }
}

fn parse_response(json: serde_json::Value) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_value(json).map_err(|e| ProviderError::MalformedResponse {
            provider: NAME,
            message: e.to_string(),
        })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider: NAME,
            message: "response has no message content".to_string(),
        })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "foo returns 1"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        });
        assert_eq!(parse_response(json).unwrap(), "foo returns 1");
    }

    #[test]
    fn test_parse_rejects_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_response(json),
            Err(ProviderError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.3,
            max_tokens: 2048,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
