use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{http_client, send_with_retry, user_message, AnswerProvider, ProviderError, SYSTEM_PROMPT};
use crate::config::AnswerConfig;

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const NAME: &str = "anthropic";

pub struct AnthropicProvider {
    headers: HeaderMap,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, config: &AnswerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            headers,
            model: config.anthropic_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerProvider for AnthropicProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        let user = user_message(query, context);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: &user,
                }],
            }],
        };

        let json = send_with_retry(NAME, self.max_retries, || {
            self.client
                .post(ENDPOINT)
                .headers(self.headers.clone())
                .json(&body)
        })
        .await?;

        Ok(parse_response(json)?)
    }
}

fn parse_response(json: serde_json::Value) -> Result<String, ProviderError> {
    let parsed: MessagesResponse =
        serde_json::from_value(json).map_err(|e| ProviderError::MalformedResponse {
            provider: NAME,
            message: e.to_string(),
        })?;
    let answer = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text),
            ResponseBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if answer.is_empty() {
        return Err(ProviderError::MalformedResponse {
            provider: NAME,
            message: "response missing text content".to_string(),
        });
    }
    Ok(answer)
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
