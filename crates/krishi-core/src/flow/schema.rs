//! Schema descriptors and the recursive validator.
//!
//! A schema is a tree of field definitions declared in YAML alongside the
//! flow's prompt:
//!
//! ```yaml
//! input:
//!   - name: cropType
//!     type: string
//!     description: "The type of crop being grown."
//!   - name: season
//!     type: enum
//!     values: [Kharif, Rabi, Zaid]
//!   - name: photoDataUri
//!     type: media
//! output:
//!   - name: crops
//!     type: array
//!     items: { type: string }
//!   - name: diagnosis
//!     type: object
//!     fields:
//!       - name: isHealthy
//!         type: boolean
//! ```
//!
//! Fields are required unless `required: false`. Validation walks fields in
//! declaration order and stops at the first violation. Unknown fields in the
//! candidate are ignored and passed through untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationReason};
use crate::flow::media::MediaReference;

/// The shape a field's value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Boolean,
    /// A string holding a `data:<mime>;base64,<payload>` reference.
    Media,
    /// A string from a closed, non-empty set.
    Enum(Vec<String>),
    Array(Box<FieldKind>),
    Object(ObjectSchema),
}

impl FieldKind {
    /// Scalars can be interpolated into prompt text.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Boolean | FieldKind::Enum(_)
        )
    }

    /// Human-readable description used in validation errors.
    pub fn expected(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Media => "media data URI".to_string(),
            FieldKind::Enum(values) => format!("one of [{}]", values.join(", ")),
            FieldKind::Array(item) => format!("array of {}", item.expected()),
            FieldKind::Object(_) => "object".to_string(),
        }
    }

    fn to_json_schema(&self, description: Option<&str>) -> Value {
        let mut schema = match self {
            FieldKind::String => serde_json::json!({ "type": "string" }),
            FieldKind::Boolean => serde_json::json!({ "type": "boolean" }),
            FieldKind::Media => serde_json::json!({
                "type": "string",
                "format": "data-uri",
            }),
            FieldKind::Enum(values) => serde_json::json!({
                "type": "string",
                "enum": values,
            }),
            FieldKind::Array(item) => serde_json::json!({
                "type": "array",
                "items": item.to_json_schema(None),
            }),
            FieldKind::Object(schema) => schema.to_json_schema(),
        };
        if let Some(desc) = description {
            schema["description"] = Value::String(desc.to_string());
        }
        schema
    }
}

/// A named field in an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Documentation; for output schemas also a hint to the model.
    pub description: Option<String>,
    pub required: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn media(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Media)
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Enum(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn array(name: impl Into<String>, item: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(item)))
    }

    pub fn object(name: impl Into<String>, schema: ObjectSchema) -> Self {
        Self::new(name, FieldKind::Object(schema))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// An ordered set of uniquely named fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldDef>", into = "Vec<FieldDef>")]
pub struct ObjectSchema {
    fields: Vec<FieldDef>,
}

impl ObjectSchema {
    /// Build a schema, rejecting duplicate field names and empty enums at any depth.
    pub fn new(fields: Vec<FieldDef>) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field name '{}'", field.name));
            }
            check_kind(&field.name, &field.kind)?;
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a candidate. On success the candidate is returned unchanged,
    /// unknown fields included.
    pub fn validate(&self, candidate: &Value) -> Result<Value, ValidationError> {
        self.validate_at("", candidate)?;
        Ok(candidate.clone())
    }

    fn validate_at(&self, path: &str, candidate: &Value) -> Result<(), ValidationError> {
        let object = candidate.as_object().ok_or_else(|| ValidationError {
            path: path.to_string(),
            expected: "object".to_string(),
            reason: ValidationReason::WrongKind {
                found: json_kind(candidate).to_string(),
            },
        })?;

        for field in &self.fields {
            let field_path = join_path(path, &field.name);
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ValidationError {
                            path: field_path,
                            expected: field.kind.expected(),
                            reason: ValidationReason::Missing,
                        });
                    }
                }
                Some(value) => validate_kind(&field_path, &field.kind, value)?,
            }
        }
        Ok(())
    }

    /// JSON Schema rendering, with field descriptions, for model requests and docs.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                field.kind.to_json_schema(field.description.as_deref()),
            );
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn check_kind(path: &str, kind: &FieldKind) -> Result<(), String> {
    match kind {
        FieldKind::Enum(values) if values.is_empty() => {
            Err(format!("enum field '{}' declares no values", path))
        }
        FieldKind::Array(item) => check_kind(path, item),
        // Nested schemas were checked by their own constructor.
        _ => Ok(()),
    }
}

fn validate_kind(path: &str, kind: &FieldKind, value: &Value) -> Result<(), ValidationError> {
    let wrong_kind = || ValidationError {
        path: path.to_string(),
        expected: kind.expected(),
        reason: ValidationReason::WrongKind {
            found: json_kind(value).to_string(),
        },
    };

    match kind {
        FieldKind::String => value.as_str().map(|_| ()).ok_or_else(wrong_kind),
        FieldKind::Boolean => value.as_bool().map(|_| ()).ok_or_else(wrong_kind),
        FieldKind::Media => {
            let s = value.as_str().ok_or_else(wrong_kind)?;
            MediaReference::parse(s)
                .map(|_| ())
                .map_err(|detail| ValidationError {
                    path: path.to_string(),
                    expected: kind.expected(),
                    reason: ValidationReason::InvalidMedia { detail },
                })
        }
        FieldKind::Enum(values) => {
            let s = value.as_str().ok_or_else(wrong_kind)?;
            if values.iter().any(|v| v == s) {
                Ok(())
            } else {
                Err(ValidationError {
                    path: path.to_string(),
                    expected: kind.expected(),
                    reason: ValidationReason::NotInEnum {
                        value: s.to_string(),
                    },
                })
            }
        }
        FieldKind::Array(item) => {
            let items = value.as_array().ok_or_else(wrong_kind)?;
            for (i, element) in items.iter().enumerate() {
                validate_kind(&format!("{}[{}]", path, i), item, element)?;
            }
            Ok(())
        }
        FieldKind::Object(schema) => schema.validate_at(path, value),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// YAML / JSON representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawKind {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawKind>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(flatten)]
    kind: RawKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
}

fn default_required() -> bool {
    true
}

impl TryFrom<RawKind> for FieldKind {
    type Error = String;

    fn try_from(raw: RawKind) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "string" => Ok(FieldKind::String),
            "boolean" => Ok(FieldKind::Boolean),
            "media" => Ok(FieldKind::Media),
            "enum" => {
                if raw.values.is_empty() {
                    return Err("enum declares no values".to_string());
                }
                Ok(FieldKind::Enum(raw.values))
            }
            "array" => {
                let items = raw
                    .items
                    .ok_or_else(|| "array requires 'items'".to_string())?;
                Ok(FieldKind::Array(Box::new(FieldKind::try_from(*items)?)))
            }
            "object" => Ok(FieldKind::Object(ObjectSchema::new(raw.fields)?)),
            other => Err(format!("unknown field type '{}'", other)),
        }
    }
}

impl From<FieldKind> for RawKind {
    fn from(kind: FieldKind) -> Self {
        let bare = |kind: &str| RawKind {
            kind: kind.to_string(),
            values: Vec::new(),
            items: None,
            fields: Vec::new(),
        };
        match kind {
            FieldKind::String => bare("string"),
            FieldKind::Boolean => bare("boolean"),
            FieldKind::Media => bare("media"),
            FieldKind::Enum(values) => RawKind {
                values,
                ..bare("enum")
            },
            FieldKind::Array(item) => RawKind {
                items: Some(Box::new(RawKind::from(*item))),
                ..bare("array")
            },
            FieldKind::Object(schema) => RawKind {
                fields: schema.fields,
                ..bare("object")
            },
        }
    }
}

impl TryFrom<RawField> for FieldDef {
    type Error = String;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let kind = FieldKind::try_from(raw.kind)
            .map_err(|e| format!("field '{}': {}", raw.name, e))?;
        Ok(FieldDef {
            name: raw.name,
            kind,
            description: raw.description,
            required: raw.required,
        })
    }
}

impl From<FieldDef> for RawField {
    fn from(field: FieldDef) -> Self {
        RawField {
            name: field.name,
            kind: RawKind::from(field.kind),
            description: field.description,
            required: field.required,
        }
    }
}

impl TryFrom<Vec<FieldDef>> for ObjectSchema {
    type Error = String;

    fn try_from(fields: Vec<FieldDef>) -> Result<Self, Self::Error> {
        ObjectSchema::new(fields)
    }
}

impl From<ObjectSchema> for Vec<FieldDef> {
    fn from(schema: ObjectSchema) -> Self {
        schema.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yield_input() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldDef::string("cropType"),
            FieldDef::string("soilType"),
            FieldDef::enumeration("season", ["Kharif", "Rabi", "Zaid"]),
            FieldDef::string("location"),
        ])
        .unwrap()
    }

    fn diagnosis_output() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldDef::object(
                "diagnosis",
                ObjectSchema::new(vec![
                    FieldDef::boolean("isHealthy"),
                    FieldDef::string("confidence"),
                ])
                .unwrap(),
            ),
            FieldDef::array("prevention", FieldKind::String),
        ])
        .unwrap()
    }

    #[test]
    fn test_valid_input_returned_unchanged() {
        let input = json!({
            "cropType": "Wheat",
            "soilType": "Alluvial Soil",
            "season": "Rabi",
            "location": "Nashik, Maharashtra",
            "extra": 42
        });
        assert_eq!(yield_input().validate(&input).unwrap(), input);
    }

    #[test]
    fn test_missing_required_field_named() {
        let input = json!({
            "cropType": "Wheat",
            "soilType": "Alluvial Soil",
            "location": "Nashik"
        });
        let err = yield_input().validate(&input).unwrap_err();
        assert_eq!(err.path, "season");
        assert_eq!(err.reason, ValidationReason::Missing);
    }

    #[test]
    fn test_first_failure_in_declaration_order() {
        let err = yield_input().validate(&json!({ "season": "Monsoon" })).unwrap_err();
        assert_eq!(err.path, "cropType");
    }

    #[test]
    fn test_enum_membership() {
        let input = json!({
            "cropType": "Wheat",
            "soilType": "Black Soil",
            "season": "Monsoon",
            "location": "Pune"
        });
        let err = yield_input().validate(&input).unwrap_err();
        assert_eq!(err.path, "season");
        assert_eq!(
            err.reason,
            ValidationReason::NotInEnum {
                value: "Monsoon".to_string()
            }
        );
    }

    #[test]
    fn test_nested_and_array_paths() {
        let bad_nested = json!({
            "diagnosis": { "isHealthy": "yes", "confidence": "High" },
            "prevention": []
        });
        let err = diagnosis_output().validate(&bad_nested).unwrap_err();
        assert_eq!(err.path, "diagnosis.isHealthy");

        let bad_item = json!({
            "diagnosis": { "isHealthy": true, "confidence": "High" },
            "prevention": ["Rotate crops", 7]
        });
        let err = diagnosis_output().validate(&bad_item).unwrap_err();
        assert_eq!(err.path, "prevention[1]");
        assert_eq!(
            err.reason,
            ValidationReason::WrongKind {
                found: "number".to_string()
            }
        );
    }

    #[test]
    fn test_optional_and_null() {
        let schema = ObjectSchema::new(vec![
            FieldDef::string("message"),
            FieldDef::string("context").optional(),
        ])
        .unwrap();
        assert!(schema.validate(&json!({ "message": "hi" })).is_ok());
        assert!(schema.validate(&json!({ "message": "hi", "context": null })).is_ok());
        let err = schema.validate(&json!({ "message": null })).unwrap_err();
        assert_eq!(err.reason, ValidationReason::Missing);
    }

    #[test]
    fn test_root_must_be_object() {
        let err = yield_input().validate(&json!("Wheat")).unwrap_err();
        assert_eq!(err.path, "");
        assert_eq!(err.expected, "object");
    }

    #[test]
    fn test_media_field_checked() {
        let schema = ObjectSchema::new(vec![FieldDef::media("photoDataUri")]).unwrap();
        assert!(schema
            .validate(&json!({ "photoDataUri": "data:image/png;base64,AAAA" }))
            .is_ok());
        let err = schema
            .validate(&json!({ "photoDataUri": "http://example.com/leaf.png" }))
            .unwrap_err();
        assert!(matches!(err.reason, ValidationReason::InvalidMedia { .. }));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let schema = diagnosis_output();
        let candidate = json!({ "diagnosis": { "isHealthy": true }, "prevention": "x" });
        let first = schema.validate(&candidate);
        for _ in 0..5 {
            assert_eq!(schema.validate(&candidate), first);
        }
    }

    #[test]
    fn test_construction_invariants() {
        let dup = ObjectSchema::new(vec![FieldDef::string("a"), FieldDef::boolean("a")]);
        assert!(dup.unwrap_err().contains("duplicate"));

        let empty_enum = ObjectSchema::new(vec![FieldDef::array(
            "langs",
            FieldKind::Enum(Vec::new()),
        )]);
        assert!(empty_enum.is_err());
    }

    #[test]
    fn test_parse_yaml_schema() {
        let yaml = r#"
- name: season
  type: enum
  values: [Kharif, Rabi, Zaid]
  description: "Growing season"
- name: schemes
  type: array
  items:
    type: object
    fields:
      - name: name
        type: string
      - name: documents
        type: string
        required: false
"#;
        let schema: ObjectSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(
            schema.field("season").unwrap().kind,
            FieldKind::Enum(vec!["Kharif".into(), "Rabi".into(), "Zaid".into()])
        );
        match &schema.field("schemes").unwrap().kind {
            FieldKind::Array(item) => match item.as_ref() {
                FieldKind::Object(inner) => {
                    assert!(!inner.field("documents").unwrap().required)
                }
                other => panic!("unexpected item kind {:?}", other),
            },
            other => panic!("unexpected kind {:?}", other),
        }

        let bad = "- name: x\n  type: enum\n  values: []\n";
        assert!(serde_yaml::from_str::<ObjectSchema>(bad).is_err());
        let dup = "- name: x\n  type: string\n- name: x\n  type: string\n";
        assert!(serde_yaml::from_str::<ObjectSchema>(dup).is_err());
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = ObjectSchema::new(vec![
            FieldDef::string("predictedYield").describe("Quintals per acre"),
            FieldDef::string("notes").optional(),
        ])
        .unwrap();
        let js = schema.to_json_schema();
        assert_eq!(js["type"], "object");
        assert_eq!(js["properties"]["predictedYield"]["description"], "Quintals per acre");
        assert_eq!(js["required"], json!(["predictedYield"]));
    }
}
