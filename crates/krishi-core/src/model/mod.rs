//! Model Invocation Client — the boundary to the generative-model service.
//!
//! Every provider adapter implements [`ModelClient`] and maps its own
//! transport and HTTP failures onto [`InvocationErrorKind`], so the executor
//! applies one error policy whichever provider is configured.
//!
//! Adapters:
//! - `GeminiClient` — `POST {base}/v1beta/models/{model}:generateContent`
//! - `AnthropicClient` — `POST {base}/v1/messages`
//! - `OpenAiClient` — `POST {base}/chat/completions`
//! - `RetryingClient` — wraps any client, retries transient failures
//! - `MockModelClient` — scripted replies for tests

mod anthropic;
mod gemini;
mod mock;
mod openai;
mod retry;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use mock::MockModelClient;
pub use openai::OpenAiClient;
pub use retry::RetryingClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ModelConfig, ModelProvider};
use crate::error::{FlowError, InvocationError, InvocationErrorKind};
use crate::flow::schema::ObjectSchema;
use crate::flow::template::RenderedRequest;

/// Everything an adapter needs for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub flow: String,
    pub system: Option<String>,
    pub rendered: RenderedRequest,
    pub output_schema: ObjectSchema,
}

impl ModelRequest {
    /// System text for providers without native schema-constrained output:
    /// the flow's own instruction followed by the output JSON Schema.
    pub fn schema_instruction(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.output_schema.to_json_schema())
            .unwrap_or_default();
        let mut out = String::new();
        if let Some(system) = &self.system {
            out.push_str(system);
            out.push_str("\n\n");
        }
        out.push_str(
            "Respond with a single JSON object that conforms to the following JSON Schema. \
             Use the field descriptions as guidance for content. Output JSON only.\n\n",
        );
        out.push_str(&schema);
        out
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the request and return the service's structured reply, not yet
    /// validated against the output schema.
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// Build the adapter selected by `config.provider`, wrapped in a
/// [`RetryingClient`] when `max_retries > 0`.
pub fn build_client(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, FlowError> {
    config.validate()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| FlowError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

    let client: Arc<dyn ModelClient> = match config.provider {
        ModelProvider::Gemini => Arc::new(GeminiClient::new(http, config)),
        ModelProvider::Anthropic => Arc::new(AnthropicClient::new(http, config)),
        ModelProvider::OpenAi => Arc::new(OpenAiClient::new(http, config)),
    };

    tracing::info!(
        "[ModelClient] Using {} at {} (model: {}, timeout: {}s, retries: {})",
        config.provider,
        config.base_url(),
        config.model(),
        config.timeout_secs,
        config.max_retries
    );

    if config.max_retries > 0 {
        Ok(Arc::new(RetryingClient::new(client, config.max_retries)))
    } else {
        Ok(client)
    }
}

/// Send a prepared request and return the JSON envelope, mapping HTTP status
/// onto an error kind.
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, InvocationError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(status_error(status, &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        InvocationError::new(
            InvocationErrorKind::Decode,
            format!("Failed to parse response JSON: {}", e),
        )
    })
}

pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> InvocationError {
    let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        InvocationErrorKind::Quota
    } else if status.is_client_error() {
        InvocationErrorKind::Rejected
    } else {
        InvocationErrorKind::Service
    };
    InvocationError::new(kind, format!("API returned {}: {}", status, truncate(body, 500)))
}

/// Interpret the model's text answer. A Markdown code fence is stripped; text
/// that still is not JSON comes back as a JSON string, which no object schema
/// accepts.
pub fn parse_reply(text: &str) -> Value {
    let body = strip_code_fence(text.trim());
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

pub(crate) fn no_text_error(provider: &str, envelope: &Value) -> InvocationError {
    InvocationError::new(
        InvocationErrorKind::Decode,
        format!(
            "{} response contained no text: {}",
            provider,
            truncate(&envelope.to_string(), 300)
        ),
    )
}

pub(crate) fn temperature_value(temperature: f64) -> Value {
    serde_json::Number::from_f64(temperature)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(0.into()))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reply_plain_and_fenced() {
        assert_eq!(
            parse_reply(r#"{"predictedYield": "20 quintals"}"#),
            json!({ "predictedYield": "20 quintals" })
        );
        assert_eq!(
            parse_reply("```json\n{\"reply\": \"Namaste\"}\n```"),
            json!({ "reply": "Namaste" })
        );
        assert_eq!(parse_reply("```\n[1, 2]\n```"), json!([1, 2]));
    }

    #[test]
    fn test_parse_reply_non_json_is_string() {
        let reply = parse_reply("Sorry, I cannot help with that.");
        assert_eq!(reply, json!("Sorry, I cannot help with that."));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "").kind,
            InvocationErrorKind::Quota
        );
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, "bad").kind,
            InvocationErrorKind::Rejected
        );
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, "").kind,
            InvocationErrorKind::Rejected
        );
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "").kind,
            InvocationErrorKind::Service
        );
        assert!(status_error(StatusCode::BAD_GATEWAY, "oops")
            .message
            .contains("502"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("नमस्ते किसान", 3).chars().count(), 4);
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_build_client_requires_key() {
        let err = build_client(&ModelConfig::default()).err().unwrap();
        assert!(matches!(err, FlowError::Configuration(_)));

        let config = ModelConfig {
            api_key: "test-key".to_string(),
            provider: ModelProvider::OpenAi,
            ..ModelConfig::default()
        };
        assert_eq!(build_client(&config).unwrap().name(), "openai");

        let retrying = ModelConfig {
            max_retries: 2,
            ..config
        };
        assert_eq!(build_client(&retrying).unwrap().name(), "openai");
    }
}
