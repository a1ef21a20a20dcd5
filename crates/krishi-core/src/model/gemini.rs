use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_text_error, parse_reply, send_json, temperature_value, ModelClient, ModelRequest};
use crate::config::ModelConfig;
use crate::error::{InvocationError, InvocationErrorKind};
use crate::flow::template::RequestPart;

/// Google Gemini `generateContent`.
///
/// POST {base_url}/v1beta/models/{model}:generateContent
/// Headers:
///   x-goog-api-key: {api_key}
///
/// Media parts are sent inline in template order; the output schema is
/// passed as `responseSchema` so the service constrains its own output.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: &ModelConfig) -> Self {
        Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let parts: Vec<Value> = request
            .rendered
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => json!({ "text": text }),
                RequestPart::Media(media) => json!({
                    "inline_data": { "mime_type": media.mime_type, "data": media.data }
                }),
            })
            .collect();

        let mut generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": to_gemini_schema(&request.output_schema.to_json_schema()),
        });
        if let Some(temp) = self.temperature {
            generation_config["temperature"] = temperature_value(temp);
        }
        if let Some(max) = self.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max);
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        tracing::info!(
            "[ModelClient] Calling Gemini API for '{}' (model: {}, media parts: {})",
            request.flow,
            self.model,
            request.rendered.media_parts().len()
        );

        let envelope = send_json(
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&self.build_body(request)),
        )
        .await?;

        if let Some(reason) = envelope
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
        {
            return Err(InvocationError::new(
                InvocationErrorKind::Rejected,
                format!("Prompt blocked by the service: {}", reason),
            ));
        }

        let text = envelope
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .and_then(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .map(str::to_string)
                    .reduce(|a, b| format!("{}{}", a, b))
            })
            .ok_or_else(|| no_text_error("Gemini", &envelope))?;

        Ok(parse_reply(&text))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Gemini accepts an OpenAPI subset: upper-case type names, and `format`
/// only as `"enum"` next to an `enum` list.
fn to_gemini_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = serde_json::Map::new();
    for (key, value) in map {
        match key.as_str() {
            "type" => {
                let ty = value.as_str().unwrap_or("string").to_ascii_uppercase();
                out.insert(key.clone(), Value::String(ty));
            }
            "format" => {}
            "properties" => {
                let props = value
                    .as_object()
                    .map(|p| {
                        p.iter()
                            .map(|(name, field)| (name.clone(), to_gemini_schema(field)))
                            .collect()
                    })
                    .unwrap_or_default();
                out.insert(key.clone(), Value::Object(props));
            }
            "items" => {
                out.insert(key.clone(), to_gemini_schema(value));
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    if out.contains_key("enum") {
        out.insert("format".to_string(), Value::String("enum".to_string()));
    }
    Value::Object(out)
}
