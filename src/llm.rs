//! Generative fallback for utterances no local rule matches.
//!
//! This is the only non-deterministic component and the only one that
//! touches the network. Its contract is narrow: text in, text out, and
//! every failure degrades to a fixed apology at this boundary. Nothing
//! past this module ever sees a transport error.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the fallback service boundary. These are logged and
/// swallowed behind [`FALLBACK_APOLOGY`]; they never cross into the
/// router or the state machine.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("no API key found in ${env}")]
    #[diagnostic(
        code(comanda::llm::missing_key),
        help("Export the key, or run without it to disable the generative fallback.")
    )]
    MissingApiKey { env: String },

    #[error("fallback request failed: {message}")]
    #[diagnostic(
        code(comanda::llm::request_failed),
        help("Check network access and the configured base_url/model.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse fallback response: {message}")]
    #[diagnostic(
        code(comanda::llm::parse_error),
        help("The service returned an unexpected response shape.")
    )]
    ParseError { message: String },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Fixed reply used whenever the fallback service fails or is disabled.
pub const FALLBACK_APOLOGY: &str =
    "I'm sorry, I can't answer that right now. Could you ask about our menu, delivery, hours, or your order?";

/// System instruction sent with every fallback request.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a friendly, concise restaurant assistant. Answer briefly and directly.";

/// Configuration for the hosted chat-completions service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model name to request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds. The fallback call is the only
    /// blocking network call in a turn, so this is kept short.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-8b-instant".into(),
            api_key_env: "GROQ_API_KEY".into(),
            timeout_secs: 6,
        }
    }
}

/// A chat message for the completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant".
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Client for the generative fallback service.
pub struct FallbackClient {
    config: LlmConfig,
    api_key: Option<String>,
}

impl FallbackClient {
    /// Create a client, reading the API key from the configured
    /// environment variable. A missing key leaves the client disabled
    /// rather than failing: the session still runs, with the apology
    /// standing in for generative replies.
    pub fn new(config: LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "no API key; generative fallback disabled"
            );
        }
        Self { config, api_key }
    }

    /// A client that never calls out, for offline runs and tests.
    pub fn disabled(config: LlmConfig) -> Self {
        Self {
            config,
            api_key: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the chat-completions request body. Split out so the
    /// request shape is testable without a network.
    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let msgs: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();
        serde_json::json!({
            "model": self.config.model,
            "messages": msgs,
            "stream": false,
        })
    }

    /// Raw fallible completion call.
    pub fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| LlmError::MissingApiKey {
            env: self.config.api_key_env.clone(),
        })?;

        let url = format!("{}/chat/completions", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let body_str =
            serde_json::to_string(&self.request_body(messages)).map_err(|e| {
                LlmError::RequestFailed {
                    message: format!("JSON serialize error: {e}"),
                }
            })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_string(&body_str)
            .map_err(|e: ureq::Error| LlmError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'choices[0].message.content' field".into(),
            })
    }

    /// Answer an unmatched utterance, degrading to the fixed apology on
    /// any failure. `context` carries an optional serialized summary of
    /// the catalog, cart, and recent turns.
    pub fn respond(&self, utterance: &str, context: Option<&str>) -> String {
        let mut messages = vec![ChatMessage::system(SYSTEM_INSTRUCTION)];
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            messages.push(ChatMessage::system(format!(
                "Current restaurant context:\n{context}"
            )));
        }
        messages.push(ChatMessage::user(utterance));

        match self.complete(&messages) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "fallback service failed; using canned apology");
                FALLBACK_APOLOGY.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_client_degrades_to_apology() {
        let client = FallbackClient::disabled(LlmConfig::default());
        assert!(!client.is_enabled());
        let reply = client.respond("xyzzy nonsense query", None);
        assert_eq!(reply, FALLBACK_APOLOGY);
    }

    #[test]
    fn complete_without_key_is_an_error() {
        let client = FallbackClient::disabled(LlmConfig::default());
        let err = client.complete(&[ChatMessage::user("hi")]).unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }

    #[test]
    fn request_shape() {
        let client = FallbackClient::disabled(LlmConfig {
            model: "test-model".into(),
            ..LlmConfig::default()
        });
        let body = client.request_body(&[
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user("do you have vegan options?"),
        ]);

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], SYSTEM_INSTRUCTION);
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn context_is_injected_as_second_system_message() {
        // Only the request shape is asserted; response content is
        // non-deterministic and out of contract.
        let client = FallbackClient::disabled(LlmConfig::default());
        let mut messages = vec![ChatMessage::system(SYSTEM_INSTRUCTION)];
        messages.push(ChatMessage::system("Current restaurant context:\ncart: empty"));
        messages.push(ChatMessage::user("hello"));
        let body = client.request_body(&messages);
        let rendered = body["messages"].as_array().unwrap();
        assert!(rendered[1]["content"]
            .as_str()
            .unwrap()
            .contains("cart: empty"));
    }
}
