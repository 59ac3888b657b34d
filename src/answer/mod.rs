//! Answer synthesis providers.
//!
//! Defines the [`AnswerProvider`] trait and concrete implementations:
//! - **[`OpenAiProvider`]**: OpenAI chat completions.
//! - **[`AnthropicProvider`]**: Anthropic messages.
//!
//! Use [`create_provider`] to pick one from [`AnswerConfig`] and the
//! environment. API keys are read from `QUACKSTACK_OPENAI_KEY` and
//! `QUACKSTACK_ANTHROPIC_KEY` only.
//!
//! # Retry Strategy
//!
//! Both providers retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, ... (capped at 2^5)

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::{AnswerConfig, ANSWER_KEY_ENV_ANTHROPIC, ANSWER_KEY_ENV_OPENAI};

pub const SYSTEM_PROMPT: &str = "You are a helpful coding assistant. Answer questions about the \
codebase using the provided code snippets. Be concise and reference specific files when relevant.";

/// Failures a caller may want to tell apart.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no answer provider configured: set QUACKSTACK_OPENAI_KEY or QUACKSTACK_ANTHROPIC_KEY")]
    NotConfigured,
    #[error("{0} is not set")]
    MissingKey(&'static str),
    #[error("{provider} API error {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} request failed: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },
    #[error("invalid {provider} response: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Whether the request is worth repeating.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Network { .. } => true,
            _ => false,
        }
    }
}

/// Turns a question plus retrieved context into an answer.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Provider identifier, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Answer `query` from `context`. The context may be empty.
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String>;
}

/// The user turn sent to every provider.
pub fn user_message(query: &str, context: &str) -> String {
    format!("Code context:\n\n{}\n\nQuestion: {}", context, query)
}

/// Which backend [`create_provider`] would build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

/// Resolve the configured provider against the available keys.
///
/// `auto` prefers OpenAI, then Anthropic.
pub fn resolve_provider(
    provider: &str,
    has_openai_key: bool,
    has_anthropic_key: bool,
) -> Result<ProviderKind, ProviderError> {
    match provider {
        "openai" if has_openai_key => Ok(ProviderKind::OpenAi),
        "openai" => Err(ProviderError::MissingKey(ANSWER_KEY_ENV_OPENAI)),
        "anthropic" if has_anthropic_key => Ok(ProviderKind::Anthropic),
        "anthropic" => Err(ProviderError::MissingKey(ANSWER_KEY_ENV_ANTHROPIC)),
        _ if has_openai_key => Ok(ProviderKind::OpenAi),
        _ if has_anthropic_key => Ok(ProviderKind::Anthropic),
        _ => Err(ProviderError::NotConfigured),
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Build the provider selected by `config` and the environment.
pub fn create_provider(config: &AnswerConfig) -> Result<Box<dyn AnswerProvider>> {
    let openai_key = env_key(ANSWER_KEY_ENV_OPENAI);
    let anthropic_key = env_key(ANSWER_KEY_ENV_ANTHROPIC);
    let kind = resolve_provider(
        &config.provider,
        openai_key.is_some(),
        anthropic_key.is_some(),
    )?;

    let provider: Box<dyn AnswerProvider> = match (kind, openai_key, anthropic_key) {
        (ProviderKind::OpenAi, Some(key), _) => Box::new(OpenAiProvider::new(key, config)?),
        (ProviderKind::Anthropic, _, Some(key)) => Box::new(AnthropicProvider::new(key, config)?),
        _ => return Err(ProviderError::NotConfigured.into()),
    };
    tracing::debug!(provider = provider.name(), "answer provider selected");
    Ok(provider)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request built by `build`, retrying transient failures.
async fn send_with_retry<F>(
    provider: &'static str,
    max_retries: u32,
    build: F,
) -> Result<serde_json::Value, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let err = match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| ProviderError::MalformedResponse {
                            provider,
                            message: e.to_string(),
                        });
                }
                let body = response.text().await.unwrap_or_default();
                ProviderError::Http {
                    provider,
                    status: status.as_u16(),
                    body,
                }
            }
            Err(e) => ProviderError::Network {
                provider,
                message: e.to_string(),
            },
        };

        if !err.is_retryable() {
            return Err(err);
        }
        tracing::warn!(provider, attempt, error = %err, "answer request failed, retrying");
        last_err = Some(err);
    }

    Err(last_err.unwrap_or(ProviderError::Network {
        provider,
        message: "request failed after retries".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_format() {
        assert_eq!(
            user_message("what is foo?", "[1] A.ts (foo)\nfunction foo() {}"),
            "Code context:\n\n[1] A.ts (foo)\nfunction foo() {}\n\nQuestion: what is foo?"
        );
    }

    #[test]
    fn test_auto_prefers_openai() {
        assert_eq!(resolve_provider("auto", true, true).unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            resolve_provider("auto", false, true).unwrap(),
            ProviderKind::Anthropic
        );
    }

    #[test]
    fn test_no_keys_names_both_variables() {
        let err = resolve_provider("auto", false, false).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(ANSWER_KEY_ENV_OPENAI));
        assert!(message.contains(ANSWER_KEY_ENV_ANTHROPIC));
    }

    #[test]
    fn test_explicit_provider_requires_its_key() {
        assert!(matches!(
            resolve_provider("anthropic", true, false),
            Err(ProviderError::MissingKey(ANSWER_KEY_ENV_ANTHROPIC))
        ));
        assert!(matches!(
            resolve_provider("openai", false, true),
            Err(ProviderError::MissingKey(ANSWER_KEY_ENV_OPENAI))
        ));
    }

    #[test]
    fn test_retryable_errors() {
        let http = |status| ProviderError::Http {
            provider: "openai",
            status,
            body: String::new(),
        };
        assert!(http(429).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!ProviderError::NotConfigured.is_retryable());
    }
}
