//! # Completion client
//!
//! Sends the composed prompt to an OpenAI-compatible `/chat/completions`
//! endpoint as a single user message and returns the model's reply.
//!
//! Failures never escape as raw transport errors. Each one is classified as a
//! [`CompletionError`], and every kind maps to exactly one fixed, user-facing
//! diagnostic through [`CompletionError::diagnostic`]:
//!
//! | kind | diagnostic |
//! |------|------------|
//! | non-200 status | [`NO_REPLY_DIAGNOSTIC`] |
//! | missing `choices`, undecodable body, empty reply | [`UNPARSEABLE_DIAGNOSTIC`] |
//! | connection, timeout, request errors | [`CALL_FAILED_DIAGNOSTIC`] |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CompletionConfig;

/// Sampling temperature used for every reply.
pub const REPLY_TEMPERATURE: f64 = 0.3;

pub const NO_REPLY_DIAGNOSTIC: &str = "[error] unable to obtain reply, check API key/configuration.";
pub const UNPARSEABLE_DIAGNOSTIC: &str = "[error] unable to parse response, check response format.";
pub const CALL_FAILED_DIAGNOSTIC: &str = "[error] call to completion API failed.";

/// Why a completion did not produce a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// The endpoint answered with something other than 200 OK.
    #[error("completion API returned HTTP {0}")]
    Status(u16),

    /// 200 OK, but the body has no non-empty `choices` array.
    #[error("completion response has no choices")]
    MissingChoices,

    /// The first choice carried no text.
    #[error("completion response has an empty reply")]
    EmptyReply,

    /// 200 OK, but the body is not JSON.
    #[error("completion response could not be decoded: {0}")]
    MalformedBody(String),

    /// The request never got a response.
    #[error("completion request failed: {0}")]
    Transport(String),
}

impl CompletionError {
    /// The fixed message shown to users for this failure.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            CompletionError::Status(_) => NO_REPLY_DIAGNOSTIC,
            CompletionError::MissingChoices
            | CompletionError::EmptyReply
            | CompletionError::MalformedBody(_) => UNPARSEABLE_DIAGNOSTIC,
            CompletionError::Transport(_) => CALL_FAILED_DIAGNOSTIC,
        }
    }
}

/// Anything that can turn a prompt into a reply.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

/// [`ChatCompleter`] backed by an OpenAI-compatible chat-completions API.
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl CompletionClient {
    /// Creates a new client from configuration.
    ///
    /// # Errors
    /// Fails only if the HTTP client cannot be initialized.
    pub fn new(config: &CompletionConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.api_base.trim_end_matches('/')
            ),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatCompleter for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: REPLY_TEMPERATURE,
        };
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Completion request failed: {}", e);
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Completion API returned {}", status);
            return Err(CompletionError::Status(status.as_u16()));
        }

        let payload: Value = response.json().await.map_err(|e| {
            warn!("Completion response unreadable: {}", e);
            if e.is_decode() {
                CompletionError::MalformedBody(e.to_string())
            } else {
                CompletionError::Transport(e.to_string())
            }
        })?;

        extract_reply(&payload)
    }
}

/// Pull the trimmed text of the first choice out of a completion response.
pub fn extract_reply(payload: &Value) -> Result<String, CompletionError> {
    let first = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(CompletionError::MissingChoices)?;

    let text = first
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();

    if text.is_empty() {
        return Err(CompletionError::EmptyReply);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(api_base: String) -> CompletionConfig {
        CompletionConfig {
            api_key: "chat_key".to_string(),
            api_base,
            model: "mock_model".to_string(),
            timeout_secs: Some(5),
        }
    }

    fn client_for(server: &MockServer) -> CompletionClient {
        CompletionClient::new(&config(format!("{}/api/v1", server.base_url()))).unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_trimmed_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/chat/completions")
                    .header("authorization", "Bearer chat_key")
                    .json_body(json!({
                        "model": "mock_model",
                        "messages": [{"role": "user", "content": "撰寫回文"}],
                        "temperature": 0.3
                    }));
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "\n  復貴公司來函。 \n"}}]
                }));
            })
            .await;

        let reply = client_for(&server).complete("撰寫回文").await;

        mock.assert_async().await;
        assert_eq!(reply, Ok("復貴公司來函。".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_no_reply_diagnostic() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert_eq!(err, CompletionError::Status(500));
        assert_eq!(err.diagnostic(), NO_REPLY_DIAGNOSTIC);
    }

    #[tokio::test]
    async fn test_missing_choices_maps_to_parse_diagnostic() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200)
                    .json_body(json!({"error": {"message": "no credits"}}));
            })
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert_eq!(err, CompletionError::MissingChoices);
        assert_eq!(err.diagnostic(), UNPARSEABLE_DIAGNOSTIC);
    }

    #[tokio::test]
    async fn test_non_json_body_maps_to_parse_diagnostic() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).body("<html>gateway</html>");
            })
            .await;

        let err = client_for(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, CompletionError::MalformedBody(_)));
        assert_eq!(err.diagnostic(), UNPARSEABLE_DIAGNOSTIC);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_call_failed_diagnostic() {
        // Port 1 is reserved and nothing listens on it.
        let client = CompletionClient::new(&config("http://127.0.0.1:1/v1".to_string())).unwrap();

        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_)));
        assert_eq!(err.diagnostic(), CALL_FAILED_DIAGNOSTIC);
    }

    #[test]
    fn test_empty_reply_is_not_success() {
        let payload = json!({"choices": [{"message": {"content": "   "}}]});
        assert_eq!(extract_reply(&payload), Err(CompletionError::EmptyReply));

        let payload = json!({"choices": [{"message": {}}]});
        assert_eq!(extract_reply(&payload), Err(CompletionError::EmptyReply));
    }

    #[test]
    fn test_empty_choices_is_missing() {
        let payload = json!({"choices": []});
        assert_eq!(extract_reply(&payload), Err(CompletionError::MissingChoices));
    }

    #[test]
    fn test_every_error_has_one_of_three_diagnostics() {
        let errors = [
            CompletionError::Status(401),
            CompletionError::MissingChoices,
            CompletionError::EmptyReply,
            CompletionError::MalformedBody("x".to_string()),
            CompletionError::Transport("x".to_string()),
        ];
        for err in errors {
            assert!(
                [NO_REPLY_DIAGNOSTIC, UNPARSEABLE_DIAGNOSTIC, CALL_FAILED_DIAGNOSTIC]
                    .contains(&err.diagnostic())
            );
        }
    }
}
