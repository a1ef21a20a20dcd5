use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_text_error, parse_reply, send_json, temperature_value, ModelClient, ModelRequest};
use crate::config::ModelConfig;
use crate::error::InvocationError;
use crate::flow::media::MediaReference;
use crate::flow::template::RequestPart;

const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic-compatible Messages API.
///
/// POST {base_url}/v1/messages
/// Headers:
///   x-api-key: {api_key}
///   anthropic-version: 2023-06-01
///
/// There is no native schema mode, so the output schema travels in the
/// system prompt.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, config: &ModelConfig) -> Self {
        Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let content: Vec<Value> = request
            .rendered
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => json!({ "type": "text", "text": text }),
                RequestPart::Media(media) => media_block(media),
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.schema_instruction(),
            "messages": [{ "role": "user", "content": content }],
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = temperature_value(temp);
        }
        body
    }
}

fn media_block(media: &MediaReference) -> Value {
    if media.is_image() {
        return json!({
            "type": "image",
            "source": { "type": "base64", "media_type": media.mime_type, "data": media.data },
        });
    }
    // Plain-text uploads (CSV and the like) go as text documents.
    if media.mime_type.starts_with("text/") {
        if let Ok(bytes) = media.bytes() {
            return json!({
                "type": "document",
                "source": {
                    "type": "text",
                    "media_type": "text/plain",
                    "data": String::from_utf8_lossy(&bytes),
                },
            });
        }
    }
    json!({
        "type": "document",
        "source": { "type": "base64", "media_type": media.mime_type, "data": media.data },
    })
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        let url = format!("{}/v1/messages", self.base_url);

        tracing::info!(
            "[ModelClient] Calling Anthropic API for '{}' (model: {})",
            request.flow,
            self.model
        );

        let envelope = send_json(
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&self.build_body(request)),
        )
        .await?;

        let text = envelope
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .map(str::to_string)
                    .reduce(|a, b| format!("{}\n{}", a, b))
            })
            .ok_or_else(|| no_text_error("Anthropic", &envelope))?;

        Ok(parse_reply(&text))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
