use async_trait::async_trait;
use serde_json::{json, Value};

use super::{no_text_error, parse_reply, send_json, temperature_value, ModelClient, ModelRequest};
use crate::config::ModelConfig;
use crate::error::InvocationError;
use crate::flow::template::RequestPart;

/// OpenAI-compatible chat completions.
///
/// POST {base_url}/chat/completions
/// Headers:
///   Authorization: Bearer {api_key}
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

impl OpenAiClient {
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
        let mut media_index = 0;
        let content: Vec<Value> = request
            .rendered
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => json!({ "type": "text", "text": text }),
                RequestPart::Media(media) if media.is_image() => json!({
                    "type": "image_url",
                    "image_url": { "url": media.to_data_uri() },
                }),
                RequestPart::Media(media) => {
                    media_index += 1;
                    json!({
                        "type": "file",
                        "file": {
                            "filename": format!("upload-{}", media_index),
                            "file_data": media.to_data_uri(),
                        },
                    })
                }
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.schema_instruction() },
                { "role": "user", "content": content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name(&request.flow),
                    "schema": request.output_schema.to_json_schema(),
                },
            },
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = temperature_value(temp);
        }
        if let Some(max) = self.max_output_tokens {
            body["max_tokens"] = json!(max);
        }
        body
    }
}

/// `json_schema.name` allows `[a-zA-Z0-9_-]` only.
fn schema_name(flow: &str) -> String {
    let name: String = flow
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "output".to_string()
    } else {
        name
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        let url = format!("{}/chat/completions", self.base_url);

        tracing::info!(
            "[ModelClient] Calling OpenAI-compatible API for '{}' (model: {})",
            request.flow,
            self.model
        );

        let envelope = send_json(
            self.http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&self.build_body(request)),
        )
        .await?;

        let text = envelope
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| no_text_error("OpenAI", &envelope))?;

        Ok(parse_reply(text))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::media::MediaReference;
    use crate::flow::schema::{FieldDef, ObjectSchema};
    use crate::flow::template::RenderedRequest;

    #[test]
    fn test_body_uses_data_uris_and_json_schema() {
        let config = ModelConfig {
            api_key: "key".to_string(),
            provider: crate::config::ModelProvider::OpenAi,
            max_output_tokens: Some(1024),
            ..ModelConfig::default()
        };
        let client = OpenAiClient::new(reqwest::Client::new(), &config);
        let request = ModelRequest {
            flow: "diagnosePlant".to_string(),
            system: Some("Be brief.".to_string()),
            rendered: RenderedRequest {
                parts: vec![
                    RequestPart::Text("Photo: ".to_string()),
                    RequestPart::Media(MediaReference::parse("data:image/png;base64,AAAA").unwrap()),
                ],
            },
            output_schema: ObjectSchema::new(vec![FieldDef::boolean("isHealthy")]).unwrap(),
        };

        let body = client.build_body(&request);
        let user = &body["messages"][1]["content"];
        assert_eq!(user[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .starts_with("Be brief."));
        assert_eq!(body["response_format"]["json_schema"]["name"], "diagnosePlant");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["properties"]["isHealthy"]["type"],
            "boolean"
        );
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_schema_name_sanitized() {
        assert_eq!(schema_name("crop.rotation v2"), "crop_rotation_v2");
    }
}
