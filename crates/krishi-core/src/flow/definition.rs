//! Flow definitions — name, input/output schemas and prompt template, loaded
//! from YAML.
//!
//! ```yaml
//! name: predictYield
//! description: "Estimate crop yield"
//! input:
//!   - name: cropType
//!     type: string
//! output:
//!   - name: predictedYield
//!     type: string
//!     description: "The estimated yield in quintals per acre."
//! prompt: |
//!   Crop Type: {{{cropType}}}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;
use crate::flow::schema::ObjectSchema;
use crate::flow::template::{RenderedRequest, Template};

/// On-disk shape of a flow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Optional system instruction sent alongside the rendered prompt.
    #[serde(default)]
    pub system: Option<String>,
    pub input: ObjectSchema,
    pub output: ObjectSchema,
    pub prompt: String,
}

/// An immutable, checked flow definition.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    name: String,
    description: Option<String>,
    system: Option<String>,
    input_schema: ObjectSchema,
    output_schema: ObjectSchema,
    template: Template,
}

impl FlowDefinition {
    /// Build a definition, checking the template against the input schema.
    pub fn new(
        name: impl Into<String>,
        input_schema: ObjectSchema,
        output_schema: ObjectSchema,
        prompt: &str,
    ) -> Result<Self, FlowError> {
        Self::from_spec(FlowSpec {
            name: name.into(),
            description: None,
            system: None,
            input: input_schema,
            output: output_schema,
            prompt: prompt.to_string(),
        })
    }

    pub fn from_spec(spec: FlowSpec) -> Result<Self, FlowError> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(FlowError::Configuration(
                "flow name must not be empty".to_string(),
            ));
        }

        let template = Template::parse(&spec.prompt);
        template
            .check_against(&spec.input)
            .map_err(|e| FlowError::Configuration(format!("flow '{}': {}", name, e)))?;

        Ok(Self {
            name,
            description: spec.description,
            system: spec.system,
            input_schema: spec.input,
            output_schema: spec.output,
            template,
        })
    }

    /// Parse a flow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        let spec: FlowSpec = serde_yaml::from_str(yaml).map_err(|e| {
            FlowError::Configuration(format!("Failed to parse flow YAML: {}", e))
        })?;
        Self::from_spec(spec)
    }

    /// Load a flow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!(
                "Failed to read flow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn input_schema(&self) -> &ObjectSchema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &ObjectSchema {
        &self.output_schema
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Validate `input` and render the prompt without invoking the model.
    pub fn render(&self, input: &Value) -> Result<RenderedRequest, FlowError> {
        let input = self
            .input_schema
            .validate(input)
            .map_err(FlowError::InputValidation)?;
        self.template
            .render(&input)
            .map_err(|e| FlowError::Configuration(format!("flow '{}': {}", self.name, e)))
    }

    /// JSON description for listings and the HTTP API.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
            "outputSchema": self.output_schema.to_json_schema(),
            "prompt": self.template.source(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET_PRICE: &str = r#"
name: getMarketPrice
description: "Current APMC price for a product"
input:
  - name: productName
    type: string
  - name: location
    type: string
output:
  - name: averagePrice
    type: string
    description: "Price range per quintal"
prompt: |
  Product: {{{productName}}}
  Location: {{{location}}}
"#;

    #[test]
    fn test_parse_flow_yaml() {
        let flow = FlowDefinition::from_yaml(MARKET_PRICE).unwrap();
        assert_eq!(flow.name(), "getMarketPrice");
        assert_eq!(flow.input_schema().fields().len(), 2);
        assert_eq!(flow.template().placeholders(), vec!["productName", "location"]);
        assert!(flow.system().is_none());
        assert_eq!(
            flow.describe()["outputSchema"]["properties"]["averagePrice"]["description"],
            "Price range per quintal"
        );
    }

    #[test]
    fn test_undeclared_placeholder_is_configuration_error() {
        let yaml = MARKET_PRICE.replace("{{{location}}}", "{{{district}}}");
        match FlowDefinition::from_yaml(&yaml) {
            Err(FlowError::Configuration(msg)) => assert!(msg.contains("district")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_validates_first() {
        let flow = FlowDefinition::from_yaml(MARKET_PRICE).unwrap();
        let rendered = flow
            .render(&serde_json::json!({ "productName": "Onion", "location": "Nashik" }))
            .unwrap();
        assert_eq!(rendered.text(), "Product: Onion\nLocation: Nashik\n");

        let err = flow
            .render(&serde_json::json!({ "productName": "Onion" }))
            .unwrap_err();
        assert_eq!(err.field(), Some("location"));
    }

    #[test]
    fn test_bad_yaml_is_configuration_error() {
        let err = FlowDefinition::from_yaml("name: [unterminated").unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }
}
